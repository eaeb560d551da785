// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validator pipeline.
//!
//! Test, style, and architecture validators are LLM-backed and live behind
//! the [`ValidatorRunner`] seam; the doctor validator is a shell command
//! run in the task workspace. All outcomes normalize to
//! [`ValidatorResult`] and share one summary formatter. The block rule
//! (`mode=block` and `status` fail/error) is the only merge gate.

use crate::error::EngineError;
use async_trait::async_trait;
use myc_core::{
    Clock, Event, EventRecord, RunId, ValidatorKind, ValidatorMode, ValidatorResult,
    ValidatorStatus,
};
use myc_storage::{CanaryMode, DoctorConfig, LogSink, PathsContext, ValidatorsConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared human summary: `Effective: yes | Concerns: 2 | Recs: 1 | Canary: skipped`.
pub fn format_summary(effective: bool, concerns: usize, recs: usize, canary: &str) -> String {
    let effective = if effective { "yes" } else { "no" };
    format!("Effective: {effective} | Concerns: {concerns} | Recs: {recs} | Canary: {canary}")
}

/// What an LLM validator reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorVerdict {
    pub status: ValidatorStatus,
    pub effective: bool,
    pub concerns: usize,
    pub recommendations: usize,
}

/// Inputs handed to a validator.
#[derive(Debug, Clone)]
pub struct ValidatorRequest {
    pub task_id: String,
    pub workspace: PathBuf,
    pub changed_files: Vec<String>,
}

/// LLM-backed validator seam.
#[async_trait]
pub trait ValidatorRunner: Send + Sync {
    async fn run(
        &self,
        kind: ValidatorKind,
        request: &ValidatorRequest,
    ) -> Result<ValidatorVerdict, EngineError>;
}

/// `MOCK_LLM=1` bypass: every validator passes with a clean verdict.
pub struct MockValidatorRunner;

#[async_trait]
impl ValidatorRunner for MockValidatorRunner {
    async fn run(
        &self,
        _kind: ValidatorKind,
        _request: &ValidatorRequest,
    ) -> Result<ValidatorVerdict, EngineError> {
        Ok(ValidatorVerdict {
            status: ValidatorStatus::Pass,
            effective: true,
            concerns: 0,
            recommendations: 0,
        })
    }
}

/// Runs the enabled validators for one task attempt.
pub struct ValidatorPipeline<C: Clock> {
    config: ValidatorsConfig,
    runner: Arc<dyn ValidatorRunner>,
    paths: PathsContext,
    project: String,
    run_id: RunId,
    sink: Arc<dyn LogSink>,
    clock: C,
}

impl<C: Clock> ValidatorPipeline<C> {
    pub fn new(
        config: ValidatorsConfig,
        runner: Arc<dyn ValidatorRunner>,
        paths: PathsContext,
        project: impl Into<String>,
        run_id: RunId,
        sink: Arc<dyn LogSink>,
        clock: C,
    ) -> Self {
        Self { config, runner, paths, project: project.into(), run_id, sink, clock }
    }

    fn emit(&self, task_id: &str, attempt: u32, event: Event) {
        self.sink.append(EventRecord {
            ts: self.clock.iso_ms(),
            run_id: self.run_id.clone(),
            task_id: Some(task_id.to_string()),
            attempt: Some(attempt),
            event,
        });
    }

    /// Run test, style, and architecture validators (doctor runs
    /// separately). Reports already on disk for this attempt are reused
    /// instead of re-running the validator.
    pub async fn run_for_task(
        &self,
        task_name: &str,
        attempt: u32,
        request: &ValidatorRequest,
    ) -> Vec<ValidatorResult> {
        let validators = [
            (ValidatorKind::Test, self.config.test),
            (ValidatorKind::Style, self.config.style),
            (ValidatorKind::Architecture, self.config.architecture),
        ];

        let mut results = Vec::new();
        for (kind, config) in validators {
            if config.mode == ValidatorMode::Off {
                continue;
            }
            let report_path = self.paths.validator_report(
                &self.project,
                self.run_id.as_str(),
                &kind.to_string(),
                &request.task_id,
                task_name,
                attempt,
            );

            let verdict = match load_report(&report_path) {
                Some(existing) => existing,
                None => {
                    let timeout = Duration::from_secs(config.timeout_seconds);
                    match tokio::time::timeout(timeout, self.runner.run(kind, request)).await {
                        Ok(Ok(verdict)) => {
                            write_report(&report_path, &verdict);
                            verdict
                        }
                        Ok(Err(err)) => {
                            self.emit(
                                &request.task_id,
                                attempt,
                                Event::ValidatorError {
                                    validator: kind.to_string(),
                                    error: err.to_string(),
                                },
                            );
                            results.push(error_result(kind, config.mode, err.to_string()));
                            continue;
                        }
                        Err(_) => {
                            let message =
                                format!("{kind} validator timed out after {}s", config.timeout_seconds);
                            self.emit(
                                &request.task_id,
                                attempt,
                                Event::ValidatorError {
                                    validator: kind.to_string(),
                                    error: message.clone(),
                                },
                            );
                            results.push(error_result(kind, config.mode, message));
                            continue;
                        }
                    }
                }
            };

            let result = ValidatorResult {
                validator: kind,
                status: verdict.status,
                mode: config.mode,
                summary: Some(format_summary(
                    verdict.effective,
                    verdict.concerns,
                    verdict.recommendations,
                    "off",
                )),
                report_path: Some(report_path),
                trigger: None,
            };

            match result.status {
                ValidatorStatus::Pass | ValidatorStatus::Skipped => self.emit(
                    &request.task_id,
                    attempt,
                    Event::ValidatorPass { validator: kind.to_string() },
                ),
                ValidatorStatus::Fail | ValidatorStatus::Error => self.emit(
                    &request.task_id,
                    attempt,
                    Event::ValidatorFail { validator: kind.to_string() },
                ),
            }
            if result.blocks() {
                self.emit(
                    &request.task_id,
                    attempt,
                    Event::ValidatorBlock {
                        validator: kind.to_string(),
                        reason: result.summary.clone().unwrap_or_default(),
                    },
                );
            }
            results.push(result);
        }
        results
    }
}

fn error_result(kind: ValidatorKind, mode: ValidatorMode, message: String) -> ValidatorResult {
    ValidatorResult {
        validator: kind,
        status: ValidatorStatus::Error,
        mode,
        summary: Some(message),
        report_path: None,
        trigger: None,
    }
}

fn load_report(path: &Path) -> Option<ValidatorVerdict> {
    let json = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&json).ok()
}

fn write_report(path: &Path, verdict: &ValidatorVerdict) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(json) = serde_json::to_vec_pretty(verdict) {
        if std::fs::write(path, json).is_err() {
            tracing::warn!(path = %path.display(), "failed to persist validator report");
        }
    }
}

/// The doctor gate: run the selected command in the workspace, optionally
/// followed by the canary double-run.
pub struct DoctorRunner<C: Clock> {
    config: DoctorConfig,
    paths: PathsContext,
    project: String,
    run_id: RunId,
    sink: Arc<dyn LogSink>,
    clock: C,
}

impl<C: Clock> DoctorRunner<C> {
    pub fn new(
        config: DoctorConfig,
        paths: PathsContext,
        project: impl Into<String>,
        run_id: RunId,
        sink: Arc<dyn LogSink>,
        clock: C,
    ) -> Self {
        Self { config, paths, project: project.into(), run_id, sink, clock }
    }

    fn emit(&self, task_id: &str, attempt: u32, event: Event) {
        self.sink.append(EventRecord {
            ts: self.clock.iso_ms(),
            run_id: self.run_id.clone(),
            task_id: Some(task_id.to_string()),
            attempt: Some(attempt),
            event,
        });
    }

    /// Run `command` as the doctor for this attempt.
    pub async fn run(
        &self,
        task_id: &str,
        task_name: &str,
        attempt: u32,
        workspace: &Path,
        command: &str,
    ) -> ValidatorResult {
        let log_path =
            self.paths.doctor_log(&self.project, self.run_id.as_str(), task_id, task_name, attempt);
        let primary = self.execute(workspace, command, &[], &log_path).await;

        let mut status = match &primary {
            Ok(0) => {
                self.emit(task_id, attempt, Event::DoctorPass { command: command.to_string() });
                ValidatorStatus::Pass
            }
            Ok(code) => {
                self.emit(
                    task_id,
                    attempt,
                    Event::DoctorFail { command: command.to_string(), exit_code: Some(*code) },
                );
                ValidatorStatus::Fail
            }
            Err(_) => {
                self.emit(
                    task_id,
                    attempt,
                    Event::DoctorFail { command: command.to_string(), exit_code: None },
                );
                ValidatorStatus::Error
            }
        };

        let mut trigger = None;
        let canary = self
            .run_canary(task_id, attempt, workspace, command, status, &log_path)
            .await;
        if canary == "unexpected_pass" && !self.config.canary.warn_on_unexpected_pass {
            if self.config.mode == ValidatorMode::Block {
                status = ValidatorStatus::Fail;
                trigger = Some("doctor_canary_failed".to_string());
            }
        } else if canary == "unexpected_pass" {
            tracing::warn!(%task_id, "doctor canary passed unexpectedly; doctor may be too permissive");
        }

        ValidatorResult {
            validator: ValidatorKind::Doctor,
            status,
            mode: self.config.mode,
            summary: Some(format_summary(status == ValidatorStatus::Pass, 0, 0, &canary)),
            report_path: Some(log_path),
            trigger,
        }
    }

    /// Canary double-run: re-execute the doctor with `<env_var>=1`. A
    /// doctor that still passes is suspect — it likely is not actually
    /// exercising anything.
    async fn run_canary(
        &self,
        task_id: &str,
        attempt: u32,
        workspace: &Path,
        command: &str,
        primary: ValidatorStatus,
        log_path: &Path,
    ) -> String {
        if self.config.canary.mode == CanaryMode::Off || primary != ValidatorStatus::Pass {
            self.emit(task_id, attempt, Event::DoctorCanarySkipped {});
            return "skipped".into();
        }

        let env_var = self.config.canary.env_var.clone();
        self.emit(task_id, attempt, Event::DoctorCanaryStart { env_var: env_var.clone() });

        let canary_log = log_path.with_extension("canary.log");
        let env = [(env_var, "1".to_string())];
        match self.execute(workspace, command, &env, &canary_log).await {
            Ok(0) => {
                self.emit(task_id, attempt, Event::DoctorCanaryUnexpectedPass {});
                "unexpected_pass".into()
            }
            _ => {
                self.emit(task_id, attempt, Event::DoctorCanaryExpectedFail {});
                "expected_fail".into()
            }
        }
    }

    /// Run the command with a timeout, teeing combined output to the
    /// doctor log. `Ok(exit_code)` or `Err` for spawn/timeout failures.
    async fn execute(
        &self,
        workspace: &Path,
        command: &str,
        env: &[(String, String)],
        log_path: &Path,
    ) -> Result<i64, EngineError> {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(workspace);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| EngineError::Timeout {
                what: format!("doctor `{command}`"),
                seconds: self.config.timeout_seconds,
            })?
            .map_err(|e| EngineError::Workspace { message: format!("doctor spawn: {e}") })?;

        let mut log = Vec::with_capacity(output.stdout.len() + output.stderr.len());
        log.extend_from_slice(&output.stdout);
        log.extend_from_slice(&output.stderr);
        let _ = std::fs::write(log_path, log);

        Ok(output.status.code().unwrap_or(-1) as i64)
    }
}

#[cfg(test)]
#[path = "validators_tests.rs"]
mod tests;
