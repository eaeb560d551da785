// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! myc-storage: On-disk layout, run-state persistence, ledger, event logs.
//!
//! Everything under `MYCELIUM_HOME` is derived from a [`PathsContext`];
//! nothing in the workspace reads environment variables after context
//! construction. Deletions verify lexical containment against the context
//! roots before touching the filesystem.

pub mod config;
pub mod eventlog;
pub mod ledger;
pub mod paths;
pub mod state_store;

pub use config::{
    BudgetConfig, BudgetMode, CanaryConfig, CanaryMode, ChecksetConfig, ConfigError, DockerConfig,
    DoctorConfig, ProjectConfig, RetryConfig, RetryPolicy, ValidatorConfig, ValidatorsConfig,
};
pub use eventlog::{EventLog, FanoutSink, LogSink, MemorySink};
pub use ledger::{Ledger, LedgerEntry};
pub use paths::{path_is_within, PathsContext};
pub use state_store::{RunLock, StateError, StateStore};
