// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level error union.
//!
//! The run engine catches everything at the per-task scope and converts it
//! into task state transitions plus a `task.failed` event; only structural
//! failures (state store, path escapes) reach the process boundary.

use crate::container::DockerError;
use myc_core::{Diagnostic, LlmError, TaskError};
use myc_storage::{ConfigError, StateError};
use myc_tasks::ManifestError;
use myc_vcs::GitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Policy(#[from] myc_policy::PolicyError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("workspace error: {message}")]
    Workspace { message: String },

    #[error("refusing to remove {path}: outside {base}")]
    PathEscape { path: String, base: String },

    #[error("{what} timed out after {seconds}s")]
    Timeout { what: String, seconds: u64 },
}

impl Diagnostic for EngineError {
    fn code(&self) -> &'static str {
        match self {
            EngineError::Task(e) => e.code(),
            EngineError::Git(e) => e.code(),
            EngineError::Docker(e) => e.code(),
            EngineError::State(e) => e.code(),
            EngineError::Config(e) => e.code(),
            EngineError::Manifest(e) => e.code(),
            EngineError::Policy(e) => e.code(),
            EngineError::Llm(e) => e.code(),
            EngineError::Workspace { .. } | EngineError::PathEscape { .. } => "TASK_ERROR",
            EngineError::Timeout { .. } => "TASK_ERROR",
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            EngineError::Task(e) => e.hint(),
            EngineError::Git(e) => e.hint(),
            EngineError::Docker(e) => e.hint(),
            EngineError::State(e) => e.hint(),
            EngineError::Config(e) => e.hint(),
            EngineError::Manifest(e) => e.hint(),
            EngineError::Policy(e) => e.hint(),
            EngineError::Llm(e) => e.hint(),
            _ => None,
        }
    }
}
