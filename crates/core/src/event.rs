// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator event vocabulary.
//!
//! Events are facts appended to the per-run JSONL streams. The wire shape
//! is one JSON object per line: `{ts, run_id, task_id?, attempt?, type,
//! payload}`. The `type`/`payload` pair is the serde-tagged [`Event`];
//! [`EventRecord`] is the envelope the log writer adds around it.

use crate::run::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single orchestrator event.
///
/// Variant names map 1:1 to the dotted wire types consumed by the UI and
/// the test suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    // --- run lifecycle ---
    #[serde(rename = "run.start")]
    RunStart { max_parallel: usize, task_count: usize },
    #[serde(rename = "run.stop")]
    RunStop { signal: String, containers: String, stop_containers_requested: bool },
    #[serde(rename = "run.complete")]
    RunComplete { status: String },

    // --- batches ---
    #[serde(rename = "batch.start")]
    BatchStart { batch_id: String, task_ids: Vec<String> },
    #[serde(rename = "batch.complete")]
    BatchComplete {
        batch_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge_commit: Option<String>,
    },
    #[serde(rename = "batch.merge_conflict")]
    BatchMergeConflict { batch_id: String, conflicts: Vec<String> },
    #[serde(rename = "batch.merge_conflict.recovered")]
    BatchMergeRecovered { batch_id: String },

    // --- tasks ---
    #[serde(rename = "task.start")]
    TaskStart { branch: String },
    #[serde(rename = "task.complete")]
    TaskComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge_commit: Option<String>,
    },
    #[serde(rename = "task.failed")]
    TaskFailed { code: String, error: String },
    #[serde(rename = "task.rescope.failed")]
    TaskRescopeFailed { reason: String },
    /// Raw (non-JSON) line from a worker's stdout/stderr.
    #[serde(rename = "task.log")]
    TaskLog { line: String },

    // --- workspaces ---
    #[serde(rename = "workspace.prepare.start")]
    WorkspacePrepareStart { path: String },
    #[serde(rename = "workspace.prepare.complete")]
    WorkspacePrepareComplete { created: bool, recovered: bool },
    #[serde(rename = "workspace.prepare.recovered")]
    WorkspacePrepareRecovered { path: String },

    // --- containers ---
    #[serde(rename = "container.start")]
    ContainerStart { container_id: String },
    #[serde(rename = "container.exit")]
    ContainerExit {
        container_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i64>,
    },
    #[serde(rename = "container.reattach")]
    ContainerReattach { container_id: String },

    // --- bootstrap sequence ---
    #[serde(rename = "bootstrap.start")]
    BootstrapStart { commands: usize },
    #[serde(rename = "bootstrap.cmd.start")]
    BootstrapCmdStart { index: usize, command: String },
    #[serde(rename = "bootstrap.cmd.complete")]
    BootstrapCmdComplete { index: usize },
    #[serde(rename = "bootstrap.cmd.fail")]
    BootstrapCmdFail { index: usize, exit_code: i64, stdout: String, stderr: String },
    #[serde(rename = "bootstrap.complete")]
    BootstrapComplete {},
    #[serde(rename = "bootstrap.failed")]
    BootstrapFailed { index: usize },

    // --- worker (codex) protocol, forwarded from container stdout ---
    #[serde(rename = "codex.thread.started")]
    CodexThreadStarted { thread_id: String },
    #[serde(rename = "codex.thread.resumed")]
    CodexThreadResumed { thread_id: String },
    #[serde(rename = "codex.auth")]
    CodexAuth { method: String },

    // --- doctor ---
    #[serde(rename = "doctor.pass")]
    DoctorPass { command: String },
    #[serde(rename = "doctor.fail")]
    DoctorFail {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i64>,
    },
    #[serde(rename = "doctor.canary.skipped")]
    DoctorCanarySkipped {},
    #[serde(rename = "doctor.canary.start")]
    DoctorCanaryStart { env_var: String },
    #[serde(rename = "doctor.canary.expected_fail")]
    DoctorCanaryExpectedFail {},
    #[serde(rename = "doctor.canary.unexpected_pass")]
    DoctorCanaryUnexpectedPass {},

    // --- validators ---
    #[serde(rename = "validator.pass")]
    ValidatorPass { validator: String },
    #[serde(rename = "validator.fail")]
    ValidatorFail { validator: String },
    #[serde(rename = "validator.error")]
    ValidatorError { validator: String, error: String },
    #[serde(rename = "validator.block")]
    ValidatorBlock { validator: String, reason: String },

    // --- budgets, compliance, policy ---
    #[serde(rename = "budget.block")]
    BudgetBlock { tokens_used: u64, max_tokens_per_task: u64 },
    #[serde(rename = "manifest.compliance.warn")]
    ManifestComplianceWarn { violations: Value },
    #[serde(rename = "manifest.compliance.block")]
    ManifestComplianceBlock { violations: Value },
    #[serde(rename = "task.policy.decision")]
    TaskPolicyDecision { decision: Value },
    #[serde(rename = "task.policy.error")]
    TaskPolicyError { error: String },
}

impl Event {
    /// The dotted wire type of this event (`"run.start"` …).
    pub fn event_type(&self) -> &'static str {
        use Event::*;
        match self {
            RunStart { .. } => "run.start",
            RunStop { .. } => "run.stop",
            RunComplete { .. } => "run.complete",
            BatchStart { .. } => "batch.start",
            BatchComplete { .. } => "batch.complete",
            BatchMergeConflict { .. } => "batch.merge_conflict",
            BatchMergeRecovered { .. } => "batch.merge_conflict.recovered",
            TaskStart { .. } => "task.start",
            TaskComplete { .. } => "task.complete",
            TaskFailed { .. } => "task.failed",
            TaskRescopeFailed { .. } => "task.rescope.failed",
            TaskLog { .. } => "task.log",
            WorkspacePrepareStart { .. } => "workspace.prepare.start",
            WorkspacePrepareComplete { .. } => "workspace.prepare.complete",
            WorkspacePrepareRecovered { .. } => "workspace.prepare.recovered",
            ContainerStart { .. } => "container.start",
            ContainerExit { .. } => "container.exit",
            ContainerReattach { .. } => "container.reattach",
            BootstrapStart { .. } => "bootstrap.start",
            BootstrapCmdStart { .. } => "bootstrap.cmd.start",
            BootstrapCmdComplete { .. } => "bootstrap.cmd.complete",
            BootstrapCmdFail { .. } => "bootstrap.cmd.fail",
            BootstrapComplete { .. } => "bootstrap.complete",
            BootstrapFailed { .. } => "bootstrap.failed",
            CodexThreadStarted { .. } => "codex.thread.started",
            CodexThreadResumed { .. } => "codex.thread.resumed",
            CodexAuth { .. } => "codex.auth",
            DoctorPass { .. } => "doctor.pass",
            DoctorFail { .. } => "doctor.fail",
            DoctorCanarySkipped { .. } => "doctor.canary.skipped",
            DoctorCanaryStart { .. } => "doctor.canary.start",
            DoctorCanaryExpectedFail { .. } => "doctor.canary.expected_fail",
            DoctorCanaryUnexpectedPass { .. } => "doctor.canary.unexpected_pass",
            ValidatorPass { .. } => "validator.pass",
            ValidatorFail { .. } => "validator.fail",
            ValidatorError { .. } => "validator.error",
            ValidatorBlock { .. } => "validator.block",
            BudgetBlock { .. } => "budget.block",
            ManifestComplianceWarn { .. } => "manifest.compliance.warn",
            ManifestComplianceBlock { .. } => "manifest.compliance.block",
            TaskPolicyDecision { .. } => "task.policy.decision",
            TaskPolicyError { .. } => "task.policy.error",
        }
    }

    /// One-line summary for tracing spans.
    pub fn log_summary(&self) -> String {
        match self {
            Event::TaskFailed { code, error } => format!("task.failed {code}: {error}"),
            Event::BatchMergeConflict { batch_id, conflicts } => {
                format!("batch.merge_conflict {batch_id} ({} branches)", conflicts.len())
            }
            other => other.event_type().to_string(),
        }
    }
}

/// Envelope written to the JSONL streams: timestamp and run/task context
/// around the tagged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: String,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(flatten)]
    pub event: Event,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
