// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! myc-engine: the orchestrator engine.
//!
//! Drives one run end to end: schedule conflict-free batches, execute one
//! containerized worker per task, gate results behind compliance and
//! validators, merge clean branches into main, and checkpoint durable state
//! so a crashed run resumes where it stopped.

pub mod compliance;
pub mod container;
pub mod error;
pub mod run;
pub mod scheduler;
pub mod validators;
pub mod worker;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use compliance::{
    apply_enforcement, check_compliance, plan_rescope, ComplianceOutcome, RescopePlan,
    ScopeViolation, ViolationReason,
};
pub use container::{
    ContainerHandle, ContainerSpec, DockerCli, DockerError, DockerWorkerRunner, FAKE_CRASH_ENV,
};
pub use error::EngineError;
pub use run::{
    should_reset_to_pending, RunEngine, RunOptions, RunOutcome, StoppedResult, STALE_HEARTBEAT,
};
pub use scheduler::{natural_cmp, plan_batch, SchedulerInput, TaskSpec};
pub use validators::{
    format_summary, DoctorRunner, MockValidatorRunner, ValidatorPipeline, ValidatorRequest,
    ValidatorRunner, ValidatorVerdict,
};
pub use worker::{LocalWorker, WorkerOutcome, WorkerRequest, WorkerRunner};
pub use workspace::{PrepareOutcome, WorkspaceManager};
