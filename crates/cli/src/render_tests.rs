// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use myc_policy::PolicyError;

#[test]
fn diagnostic_carries_code_and_hint() {
    let err = PolicyError::ModelNotBuilt { sha: "abc".into() };
    let cli = CliError::from_diagnostic(&err);
    assert_eq!(cli.code, "MODEL_NOT_BUILT");
    assert!(cli.hint.as_deref().unwrap_or_default().contains("cg build"));
}

#[test]
fn short_render_omits_code() {
    let cli = CliError::new("TASK_ERROR", "illegal transition").with_hint("check the run state");
    let short = cli.render(false);
    assert!(short.contains("illegal transition"));
    assert!(short.contains("hint: check the run state"));
    assert!(!short.contains("TASK_ERROR"));
}

#[test]
fn debug_render_adds_code_and_causes() {
    let mut cli = CliError::new("GIT_ERROR", "merge failed");
    cli.causes.push("exit status 128".into());
    let debug = cli.render(true);
    assert!(debug.contains("code: GIT_ERROR"));
    assert!(debug.contains("cause: exit status 128"));
}

#[test]
fn error_envelope_shape() {
    let cli = CliError::new("MODEL_NOT_BUILT", "no model").with_hint("build it");
    let value = cli.envelope();
    assert_eq!(value["ok"], false);
    assert_eq!(value["error"]["code"], "MODEL_NOT_BUILT");
    assert_eq!(value["error"]["message"], "no model");
    assert_eq!(value["error"]["details"]["hint"], "build it");
}

#[test]
fn ok_envelope_shape() {
    let value = ok_envelope(serde_json::json!({"n": 1}));
    assert_eq!(value["ok"], true);
    assert_eq!(value["result"]["n"], 1);
}
