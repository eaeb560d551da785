// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across crates.
//!
//! Every orchestrator error family implements [`Diagnostic`]: a stable
//! machine-readable `code` plus an optional operator `hint`. The CLI
//! renderer pattern-matches on these instead of error class hierarchies.

use thiserror::Error;

/// Uniform diagnostic surface over the error families.
pub trait Diagnostic {
    /// Stable machine-readable code (e.g. `TASK_ERROR`).
    fn code(&self) -> &'static str;

    /// Optional actionable hint for the operator.
    fn hint(&self) -> Option<String> {
        None
    }
}

/// Task-level failures: illegal state transitions, missing manifests,
/// rescope that cannot be computed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("illegal task transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("unknown task: {id}")]
    UnknownTask { id: String },

    #[error("manifest missing for task {id}")]
    ManifestMissing { id: String },

    #[error("automatic rescope failed for task {id}: {reason}")]
    RescopeFailed { id: String, reason: String },
}

impl Diagnostic for TaskError {
    fn code(&self) -> &'static str {
        "TASK_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            TaskError::RescopeFailed { .. } => {
                Some("Review the task's declared locks and re-run, or resolve manually.".into())
            }
            _ => None,
        }
    }
}

/// LLM provider failures surfaced at the validator seam.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request failed with status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("provider request timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl Diagnostic for LlmError {
    fn code(&self) -> &'static str {
        "LLM_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            LlmError::Provider { status: 401, .. } => {
                Some("Check that your provider API key is set and valid.".into())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
