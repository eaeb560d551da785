// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration (`projects/<project>/config.yaml`).
//!
//! Strict schema with defaults. Command strings support `${VAR}`
//! environment templating, resolved at load time; a missing variable is a
//! `CONFIG_ERROR`.

use myc_core::{Diagnostic, ValidatorMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("undefined environment variable ${{{var}}} in `{field}`")]
    MissingEnvVar { var: String, field: String },
}

impl Diagnostic for ConfigError {
    fn code(&self) -> &'static str {
        "CONFIG_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            ConfigError::MissingEnvVar { var, .. } => {
                Some(format!("Export {var} or remove the template reference."))
            }
            ConfigError::Parse { .. } => {
                Some("Config uses a strict schema; remove unknown keys.".into())
            }
            _ => None,
        }
    }
}

fn default_main_branch() -> String {
    "main".into()
}

fn default_tasks_dir() -> String {
    "tasks".into()
}

fn default_max_parallel() -> usize {
    4
}

fn default_branch_prefix() -> String {
    "mycelium/".into()
}

/// Docker settings for worker containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DockerConfig {
    pub image: String,
    /// Directory holding the worker Dockerfile template.
    pub build_context: String,
    pub network_mode: String,
    pub memory_mb: Option<u64>,
    pub cpu_quota: Option<u64>,
    pub pids_limit: Option<u64>,
    pub user: Option<String>,
    /// Shell commands run inside the container before the worker loop.
    pub bootstrap: Vec<String>,
    /// Cap on captured bootstrap stdout/stderr, in bytes.
    pub bootstrap_output_limit: usize,
    pub stop_containers_on_exit: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            image: "mycelium-worker".into(),
            build_context: ".mycelium/worker".into(),
            network_mode: "bridge".into(),
            memory_mb: None,
            cpu_quota: None,
            pids_limit: None,
            user: None,
            bootstrap: Vec::new(),
            bootstrap_output_limit: 16 * 1024,
            stop_containers_on_exit: false,
        }
    }
}

/// One validator's settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidatorConfig {
    pub mode: ValidatorMode,
    pub timeout_seconds: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { mode: ValidatorMode::Off, timeout_seconds: 300 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidatorsConfig {
    pub test: ValidatorConfig,
    pub style: ValidatorConfig,
    pub architecture: ValidatorConfig,
}

/// Doctor canary mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryMode {
    #[default]
    Off,
    Env,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CanaryConfig {
    pub mode: CanaryMode,
    pub env_var: String,
    pub warn_on_unexpected_pass: bool,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self { mode: CanaryMode::Off, env_var: "ORCH_CANARY".into(), warn_on_unexpected_pass: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DoctorConfig {
    /// Project-wide fallback doctor command.
    pub command: String,
    pub timeout_seconds: u64,
    pub mode: ValidatorMode,
    pub canary: CanaryConfig,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            timeout_seconds: 600,
            mode: ValidatorMode::Block,
            canary: CanaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    #[default]
    Off,
    Warn,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BudgetConfig {
    pub mode: BudgetMode,
    pub max_tokens_per_task: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { mode: BudgetMode::Off, max_tokens_per_task: 2_000_000 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    Retry,
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    pub policy: RetryPolicy,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { policy: RetryPolicy::Retry, max_attempts: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChecksetConfig {
    pub max_components_for_scoped: usize,
    /// Per-component verification commands for scoped checksets.
    pub commands: std::collections::BTreeMap<String, String>,
}

impl Default for ChecksetConfig {
    fn default() -> Self {
        Self { max_components_for_scoped: 3, commands: std::collections::BTreeMap::new() }
    }
}

/// Full project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProjectConfig {
    pub main_branch: String,
    pub tasks_dir: String,
    pub max_parallel: usize,
    pub branch_prefix: String,
    pub timeout_minutes: Option<u64>,
    pub docker: DockerConfig,
    pub validators: ValidatorsConfig,
    pub doctor: DoctorConfig,
    pub budgets: BudgetConfig,
    pub manifest_enforcement: ValidatorMode,
    pub checkset: ChecksetConfig,
    pub retry: RetryConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            tasks_dir: default_tasks_dir(),
            max_parallel: default_max_parallel(),
            branch_prefix: default_branch_prefix(),
            timeout_minutes: None,
            docker: DockerConfig::default(),
            validators: ValidatorsConfig::default(),
            doctor: DoctorConfig::default(),
            budgets: BudgetConfig::default(),
            manifest_enforcement: ValidatorMode::Warn,
            checkset: ChecksetConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load from YAML, then resolve `${VAR}` templates in command fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, yaml: &str) -> Result<Self, ConfigError> {
        let mut config: ProjectConfig = serde_yaml::from_str(yaml)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.doctor.command = interpolate_env(&config.doctor.command, "doctor.command")?;
        config.docker.image = interpolate_env(&config.docker.image, "docker.image")?;
        for (i, cmd) in config.docker.bootstrap.clone().iter().enumerate() {
            config.docker.bootstrap[i] =
                interpolate_env(cmd, &format!("docker.bootstrap[{i}]"))?;
        }
        Ok(config)
    }

    /// Scaffold written by `myc init`.
    pub fn scaffold_yaml() -> String {
        let mut out = String::from("# Mycelium project configuration\n");
        out.push_str(&serde_yaml::to_string(&ProjectConfig::default()).unwrap_or_default());
        out
    }
}

/// Replace `${VAR}` references with environment values.
fn interpolate_env(input: &str, field: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            // No closing brace: keep the literal text.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let var = &tail[..end];
        match std::env::var(var) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                return Err(ConfigError::MissingEnvVar {
                    var: var.to_string(),
                    field: field.to_string(),
                })
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
