// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identifier and status state machine.

use crate::error::TaskError;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier of a task, declared in its manifest (e.g. `"12"`).
    pub struct TaskId;
}

/// Status of a task inside a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be scheduled (or reset for another attempt)
    #[default]
    Pending,
    /// Worker container is executing
    Running,
    /// Worker succeeded; compliance and validators not yet settled
    Validated,
    /// Merged into main
    Complete,
    /// Out-of-scope changes detected; automatic rescope pending
    NeedsRescope,
    /// Blocked on an operator decision
    NeedsHumanReview,
    /// Terminal failure
    Failed,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Validated => "validated",
        Complete => "complete",
        NeedsRescope => "needs_rescope",
        NeedsHumanReview => "needs_human_review",
        Failed => "failed",
    }
}

impl TaskStatus {
    /// Whether this status admits a transition to `to`.
    ///
    /// The matrix mirrors the orchestrator loop: workers move tasks between
    /// `pending`/`running`, compliance and validators fan `validated` out,
    /// and rescope feeds back into `pending`. Everything else is illegal
    /// and must be rejected without touching state.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Validated)
                | (Running, Pending)
                | (Running, Failed)
                | (Validated, Complete)
                | (Validated, NeedsRescope)
                | (Validated, NeedsHumanReview)
                | (NeedsRescope, Pending)
                | (NeedsRescope, NeedsHumanReview)
        )
    }

    /// Guarded transition: `Ok(to)` or a typed error naming both states.
    pub fn transition(self, to: TaskStatus) -> Result<TaskStatus, TaskError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(TaskError::IllegalTransition { from: self.to_string(), to: to.to_string() })
        }
    }

    /// Statuses the scheduler treats as done (never re-admitted to a batch).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed | TaskStatus::NeedsHumanReview)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
