// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use myc_core::{FakeClock, RunId, TaskId};
use tempfile::TempDir;

fn store(tmp: &TempDir) -> StateStore {
    StateStore::new(PathsContext::with_home(tmp.path()), "demo")
}

fn sample_state() -> RunState {
    RunState::new(
        RunId::new("run-a"),
        "demo",
        PathBuf::from("/tmp/repo"),
        "main",
        "abc",
        ["1"].into_iter().map(TaskId::from),
        &FakeClock::new(),
    )
}

#[test]
fn save_then_load_round_trips() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    let state = sample_state();
    store.save(&state).unwrap();
    let loaded = store.load("run-a").unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn save_leaves_no_temp_file() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.save(&sample_state()).unwrap();
    let dir = tmp.path().join("state/demo");
    let leftovers: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn load_missing_is_not_found_with_hint() {
    let tmp = TempDir::new().unwrap();
    let err = store(&tmp).load("run-nope").unwrap_err();
    assert!(matches!(err, StateError::NotFound { .. }));
    assert!(myc_core::Diagnostic::hint(&err).unwrap_or_default().contains("resume"));
}

#[test]
fn load_corrupt_is_typed() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    let path = store.state_file("run-bad");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();
    let err = store.load("run-bad").unwrap_err();
    assert!(matches!(err, StateError::Corrupt { .. }));
}

#[test]
fn second_lock_on_same_run_fails() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    let _guard = store.lock_run("run-a").unwrap();
    let err = store.lock_run("run-a").unwrap_err();
    assert!(matches!(err, StateError::Locked { .. }));
}

#[test]
fn lock_released_on_drop() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    drop(store.lock_run("run-a").unwrap());
    assert!(store.lock_run("run-a").is_ok());
}

#[test]
fn latest_run_id_prefers_newest_mtime() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    let mut first = sample_state();
    first.run_id = RunId::new("run-old");
    store.save(&first).unwrap();
    // Coarse mtime filesystems need a visible gap.
    std::thread::sleep(std::time::Duration::from_millis(20));
    let mut second = sample_state();
    second.run_id = RunId::new("run-new");
    store.save(&second).unwrap();
    assert_eq!(store.latest_run_id().unwrap().as_deref(), Some("run-new"));
}

#[test]
fn run_ids_lists_only_json_states() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp);
    store.save(&sample_state()).unwrap();
    let _guard = store.lock_run("run-a").unwrap();
    assert_eq!(store.run_ids().unwrap(), vec!["run-a".to_string()]);
}
