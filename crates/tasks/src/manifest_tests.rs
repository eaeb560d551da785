// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn minimal_json() -> serde_json::Value {
    serde_json::json!({
        "id": "3",
        "name": "Add retry to uploader",
        "estimated_minutes": 20,
        "verify": { "doctor": "cargo test -p uploader" }
    })
}

fn parse(value: serde_json::Value) -> Result<TaskManifest, ManifestError> {
    TaskManifest::parse(&PathBuf::from("manifest.json"), &value.to_string())
}

#[test]
fn minimal_manifest_parses_with_defaults() {
    let m = parse(minimal_json()).unwrap();
    assert_eq!(m.id, "3");
    assert!(m.dependencies.is_empty());
    assert!(m.locks.is_empty());
    assert_eq!(m.tdd_mode, TddMode::Off);
    assert!(m.verify.fast.is_none());
}

#[test]
fn unknown_keys_are_rejected() {
    let mut value = minimal_json();
    value["surprise"] = serde_json::json!(true);
    let err = parse(value).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "got {err:?}");
}

#[test]
fn unknown_verify_keys_are_rejected() {
    let mut value = minimal_json();
    value["verify"]["slow"] = serde_json::json!("make slow");
    assert!(parse(value).is_err());
}

#[test]
fn zero_estimate_is_invalid() {
    let mut value = minimal_json();
    value["estimated_minutes"] = serde_json::json!(0);
    let err = parse(value).unwrap_err();
    assert!(matches!(err, ManifestError::Invalid { .. }));
}

#[test]
fn empty_doctor_is_invalid() {
    let mut value = minimal_json();
    value["verify"]["doctor"] = serde_json::json!("  ");
    assert!(parse(value).is_err());
}

#[test]
fn self_dependency_is_invalid() {
    let mut value = minimal_json();
    value["dependencies"] = serde_json::json!(["3"]);
    let err = parse(value).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("depend on itself"), "message was {msg}");
}

#[test]
fn locks_normalize_through_parse() {
    let mut value = minimal_json();
    value["locks"] = serde_json::json!({ "reads": ["db", "db"], "writes": ["auth"] });
    let m = parse(value).unwrap();
    // Normalization happens when the scheduler consumes the locks; the
    // manifest records exactly what was declared.
    assert_eq!(m.locks.reads, vec!["db", "db"]);
    assert_eq!(m.locks.normalized().reads, vec!["db"]);
}

#[test]
fn rescoped_widens_writes_only() {
    let m = parse(minimal_json()).unwrap();
    let widened = m.rescoped(&["billing".into()], &["src/billing/mod.rs".into()]);
    assert_eq!(widened.locks.writes, vec!["billing"]);
    assert_eq!(widened.files.writes, vec!["src/billing/mod.rs"]);
    assert!(widened.locks.reads.is_empty());
    // original untouched
    assert!(m.locks.writes.is_empty());
}

#[test]
fn canonical_json_is_deterministic() {
    let a = parse(minimal_json()).unwrap();
    let b = parse(minimal_json()).unwrap();
    assert_eq!(a.canonical_json(), b.canonical_json());
    assert!(!a.canonical_json().is_empty());
}
