// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::path::PathBuf;

fn parse(yaml: &str) -> Result<ProjectConfig, ConfigError> {
    ProjectConfig::parse(&PathBuf::from("config.yaml"), yaml)
}

#[test]
fn empty_config_gets_defaults() {
    let config = parse("{}").unwrap();
    assert_eq!(config.main_branch, "main");
    assert_eq!(config.max_parallel, 4);
    assert_eq!(config.branch_prefix, "mycelium/");
    assert_eq!(config.doctor.canary.env_var, "ORCH_CANARY");
    assert_eq!(config.manifest_enforcement, myc_core::ValidatorMode::Warn);
    assert_eq!(config.checkset.max_components_for_scoped, 3);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = parse("main_branch: main\nsurprise: 1\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(myc_core::Diagnostic::code(&err), "CONFIG_ERROR");
}

#[test]
fn nested_settings_parse() {
    let config = parse(
        "doctor:\n  command: make check\n  mode: block\n  canary:\n    mode: env\n\
         budgets:\n  mode: block\n  max_tokens_per_task: 5000\n\
         retry:\n  policy: fail_fast\n",
    )
    .unwrap();
    assert_eq!(config.doctor.command, "make check");
    assert_eq!(config.doctor.canary.mode, CanaryMode::Env);
    assert_eq!(config.budgets.mode, BudgetMode::Block);
    assert_eq!(config.budgets.max_tokens_per_task, 5000);
    assert_eq!(config.retry.policy, RetryPolicy::FailFast);
}

#[test]
#[serial]
fn env_templating_resolves() {
    std::env::set_var("MYC_TEST_TOOLCHAIN", "stable");
    let config = parse("doctor:\n  command: cargo +${MYC_TEST_TOOLCHAIN} test\n").unwrap();
    assert_eq!(config.doctor.command, "cargo +stable test");
    std::env::remove_var("MYC_TEST_TOOLCHAIN");
}

#[test]
#[serial]
fn missing_env_var_is_config_error() {
    std::env::remove_var("MYC_TEST_UNSET");
    let err = parse("doctor:\n  command: run ${MYC_TEST_UNSET}\n").unwrap_err();
    match &err {
        ConfigError::MissingEnvVar { var, field } => {
            assert_eq!(var, "MYC_TEST_UNSET");
            assert_eq!(field, "doctor.command");
        }
        other => panic!("expected MissingEnvVar, got {other:?}"),
    }
    assert!(myc_core::Diagnostic::hint(&err).is_some());
}

#[test]
fn unclosed_template_is_kept_literal() {
    let config = parse("doctor:\n  command: \"echo ${oops\"\n").unwrap();
    assert_eq!(config.doctor.command, "echo ${oops");
}

#[test]
fn scaffold_round_trips() {
    let yaml = ProjectConfig::scaffold_yaml();
    let config = parse(&yaml).unwrap();
    assert_eq!(config, ProjectConfig::default());
}
