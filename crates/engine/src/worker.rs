// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker execution capability.
//!
//! A worker receives a prepared workspace on the task branch and is
//! expected to commit its code change there. Production workers run inside
//! Docker containers ([`crate::container::DockerCli`]); `--local-worker`
//! runs the command in-process; tests substitute fakes.

use crate::error::EngineError;
use async_trait::async_trait;
use myc_core::TokenUsage;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a runner needs to execute one task attempt.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub project: String,
    pub run_id: String,
    pub task_id: String,
    pub task_name: String,
    pub attempt: u32,
    pub workspace: PathBuf,
    pub branch: String,
    /// Prompt/manifest inputs forwarded to the in-container worker loop.
    pub inputs: HashMap<String, String>,
    pub cancel: CancellationToken,
}

/// What a worker attempt produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutcome {
    pub success: bool,
    /// Failed workers may ask for another attempt; the retry policy decides.
    pub reset_to_pending: bool,
    pub usage: TokenUsage,
    pub container_id: Option<String>,
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn ok() -> Self {
        Self { success: true, ..Self::default() }
    }
}

/// Capability interface for running workers.
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    /// Ensure the worker image (or other runtime prerequisites) exist.
    /// Called once per run, before the first batch.
    async fn prepare(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Execute one attempt to completion.
    async fn run(&self, request: &WorkerRequest) -> Result<WorkerOutcome, EngineError>;

    /// Reattach to a still-live worker from a previous process, if any.
    /// `Ok(None)` means nothing to reattach; the attempt is treated as
    /// terminated and the task is rescheduled.
    async fn reattach(&self, request: &WorkerRequest) -> Result<Option<WorkerOutcome>, EngineError>;

    /// Stop any in-flight workers for this run (shutdown discipline).
    async fn stop_all(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// In-process worker for `--local-worker` / `MOCK_LLM=1`: runs a shell
/// command in the workspace instead of a container.
pub struct LocalWorker {
    pub command: String,
}

#[async_trait]
impl WorkerRunner for LocalWorker {
    async fn run(&self, request: &WorkerRequest) -> Result<WorkerOutcome, EngineError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&request.workspace)
            .envs(request.inputs.iter())
            .output()
            .await
            .map_err(|e| EngineError::Workspace { message: format!("local worker: {e}") })?;
        if output.status.success() {
            Ok(WorkerOutcome::ok())
        } else {
            Ok(WorkerOutcome {
                success: false,
                reset_to_pending: false,
                usage: TokenUsage::default(),
                container_id: None,
                error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            })
        }
    }

    async fn reattach(
        &self,
        _request: &WorkerRequest,
    ) -> Result<Option<WorkerOutcome>, EngineError> {
        // Local workers die with the orchestrator process.
        Ok(None)
    }
}
