// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn result(mode: ValidatorMode, status: ValidatorStatus) -> ValidatorResult {
    ValidatorResult {
        validator: ValidatorKind::Test,
        status,
        mode,
        summary: None,
        report_path: None,
        trigger: None,
    }
}

#[parameterized(
    block_fail = { ValidatorMode::Block, ValidatorStatus::Fail, true },
    block_error = { ValidatorMode::Block, ValidatorStatus::Error, true },
    block_pass = { ValidatorMode::Block, ValidatorStatus::Pass, false },
    block_skipped = { ValidatorMode::Block, ValidatorStatus::Skipped, false },
    warn_fail = { ValidatorMode::Warn, ValidatorStatus::Fail, false },
    off_error = { ValidatorMode::Off, ValidatorStatus::Error, false },
)]
fn block_rule(mode: ValidatorMode, status: ValidatorStatus, expect: bool) {
    assert_eq!(result(mode, status).blocks(), expect);
}

#[test]
fn into_block_prefers_trigger() {
    let mut r = result(ValidatorMode::Block, ValidatorStatus::Fail);
    r.trigger = Some("doctor_canary_failed".into());
    r.summary = Some("some summary".into());
    let block = r.into_block().unwrap();
    assert_eq!(block.reason, "doctor_canary_failed");
}

#[test]
fn into_block_falls_back_to_summary_then_status() {
    let mut r = result(ValidatorMode::Block, ValidatorStatus::Error);
    r.summary = Some("compile failed".into());
    assert_eq!(r.clone().into_block().unwrap().reason, "compile failed");

    let bare = result(ValidatorMode::Block, ValidatorStatus::Fail);
    assert_eq!(bare.into_block().unwrap().reason, "test fail");
}

#[test]
fn passing_result_produces_no_block() {
    assert!(result(ValidatorMode::Block, ValidatorStatus::Pass).into_block().is_none());
}
