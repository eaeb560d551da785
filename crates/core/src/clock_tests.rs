// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn system_clock_epoch_is_nonzero() {
    let clock = SystemClock;
    assert!(clock.epoch_ms() > 0);
}

#[test]
fn fake_clock_advance() {
    let clock = FakeClock::new();
    let before = clock.epoch_ms();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.epoch_ms(), before + 90_000);
}

#[test]
fn fake_clock_set_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.epoch_ms(), 1_700_000_000_000);
}

#[test]
fn iso_ms_has_millisecond_precision() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_123);
    let ts = clock.iso_ms();
    assert!(ts.ends_with(".123Z"), "timestamp was {ts}");
    assert!(ts.starts_with("2023-11-14T"), "timestamp was {ts}");
}

#[test]
fn clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(5));
    assert_eq!(clock.epoch_ms(), other.epoch_ms());
}
