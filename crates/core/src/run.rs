// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run state: the durable record driven by the run engine.
//!
//! `RunState` owns its tasks and batches. All mutations go through guarded
//! methods that bump `updated_at`; an illegal transition returns a typed
//! error and leaves the record untouched.

use crate::batch::Batch;
use crate::clock::Clock;
use crate::error::TaskError;
use crate::task::{TaskId, TaskStatus};
use crate::validator::ValidatorResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a run. Operator-supplied via `--run-id` or
    /// generated.
    pub struct RunId("run-");
}

/// Status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Complete,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Complete => "complete",
        Failed => "failed",
    }
}

impl RunStatus {
    pub fn can_transition(self, to: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Complete)
                | (Running, Failed)
                | (Running, Paused)
                | (Paused, Running)
        )
    }
}

/// Accumulated LLM usage for a task or run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens: u64,
    pub estimated_cost: f64,
}

/// A phase checkpoint recorded after each worker lifecycle step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: String,
    pub at: String,
}

/// Operator override record (the only path around the transition guard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub status: TaskStatus,
    pub reason: String,
    pub at: String,
}

/// Per-task state inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub id: TaskId,
    pub status: TaskStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Epoch ms of the last worker event; drives stale detection on resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_ms: Option<u64>,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    #[serde(default)]
    pub validator_results: Vec<ValidatorResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_review: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "override")]
    pub override_record: Option<OverrideRecord>,
}

impl TaskState {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            attempts: 0,
            branch: None,
            workspace: None,
            logs_dir: None,
            container_id: None,
            heartbeat_ms: None,
            tokens_used: 0,
            estimated_cost: 0.0,
            validator_results: Vec::new(),
            human_review: None,
            checkpoints: Vec::new(),
            override_record: None,
        }
    }
}

/// The durable record of one run. One JSON file per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub project: String,
    pub repo_path: PathBuf,
    pub main_branch: String,
    pub base_sha: String,
    pub status: RunStatus,
    pub tasks: Vec<TaskState>,
    pub batches: Vec<Batch>,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    pub updated_at: String,
}

impl RunState {
    pub fn new(
        run_id: RunId,
        project: impl Into<String>,
        repo_path: PathBuf,
        main_branch: impl Into<String>,
        base_sha: impl Into<String>,
        task_ids: impl IntoIterator<Item = TaskId>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            run_id,
            project: project.into(),
            repo_path,
            main_branch: main_branch.into(),
            base_sha: base_sha.into(),
            status: RunStatus::Pending,
            tasks: task_ids.into_iter().map(TaskState::new).collect(),
            batches: Vec::new(),
            tokens_used: 0,
            estimated_cost: 0.0,
            updated_at: clock.iso_ms(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskState> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut TaskState> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Guarded task transition. Illegal moves error out without mutating
    /// anything, including `updated_at`.
    pub fn transition_task(
        &mut self,
        id: &str,
        to: TaskStatus,
        clock: &impl Clock,
    ) -> Result<(), TaskError> {
        let at = clock.iso_ms();
        let task = self
            .task_mut(id)
            .ok_or_else(|| TaskError::UnknownTask { id: id.to_string() })?;
        task.status = task.status.transition(to)?;
        if to == TaskStatus::Running {
            task.attempts += 1;
        }
        task.checkpoints.push(Checkpoint { phase: to.to_string(), at: at.clone() });
        self.updated_at = at;
        Ok(())
    }

    /// Operator override: bypasses the guard and records why.
    pub fn override_task(
        &mut self,
        id: &str,
        to: TaskStatus,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskError> {
        let at = clock.iso_ms();
        let task = self
            .task_mut(id)
            .ok_or_else(|| TaskError::UnknownTask { id: id.to_string() })?;
        task.status = to;
        task.override_record =
            Some(OverrideRecord { status: to, reason: reason.into(), at: at.clone() });
        self.updated_at = at;
        Ok(())
    }

    /// Guarded run-status transition.
    pub fn set_status(&mut self, to: RunStatus, clock: &impl Clock) -> Result<(), TaskError> {
        if !self.status.can_transition(to) {
            return Err(TaskError::IllegalTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = clock.iso_ms();
        Ok(())
    }

    /// Accumulate worker usage into the task and the run totals.
    pub fn record_usage(&mut self, id: &str, usage: TokenUsage, clock: &impl Clock) {
        if let Some(task) = self.task_mut(id) {
            task.tokens_used += usage.tokens;
            task.estimated_cost += usage.estimated_cost;
            self.tokens_used += usage.tokens;
            self.estimated_cost += usage.estimated_cost;
            self.updated_at = clock.iso_ms();
        }
    }

    /// Bump a running task's heartbeat.
    pub fn heartbeat(&mut self, id: &str, clock: &impl Clock) {
        let now = clock.epoch_ms();
        let at = clock.iso_ms();
        if let Some(task) = self.task_mut(id) {
            task.heartbeat_ms = Some(now);
            self.updated_at = at;
        }
    }

    /// Ids of tasks whose status is `complete`, for dependency resolution.
    pub fn completed_ids(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Complete)
            .map(|t| t.id.to_string())
            .collect()
    }

    /// Whether every task has reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
