// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validator outcome records.
//!
//! Every validator (test, style, architecture, doctor) reduces to a
//! [`ValidatorResult`]; the block rule is the single merge gate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which validator produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Test,
    Style,
    Architecture,
    Doctor,
}

crate::simple_display! {
    ValidatorKind {
        Test => "test",
        Style => "style",
        Architecture => "architecture",
        Doctor => "doctor",
    }
}

/// Normalized validator outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    Pass,
    Fail,
    Error,
    Skipped,
}

crate::simple_display! {
    ValidatorStatus {
        Pass => "pass",
        Fail => "fail",
        Error => "error",
        Skipped => "skipped",
    }
}

/// Enforcement mode configured per validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorMode {
    Off,
    #[default]
    Warn,
    Block,
}

crate::simple_display! {
    ValidatorMode {
        Off => "off",
        Warn => "warn",
        Block => "block",
    }
}

/// One validator's normalized result for one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorResult {
    pub validator: ValidatorKind,
    pub status: ValidatorStatus,
    pub mode: ValidatorMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    /// What escalated this result (e.g. `doctor_canary_failed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl ValidatorResult {
    /// Blocks merge iff `mode=block` and the status is fail or error.
    pub fn blocks(&self) -> bool {
        self.mode == ValidatorMode::Block
            && matches!(self.status, ValidatorStatus::Fail | ValidatorStatus::Error)
    }

    /// Convert into a block record when the block rule fires.
    pub fn into_block(self) -> Option<ValidationBlock> {
        if self.blocks() {
            let reason = self
                .trigger
                .clone()
                .or_else(|| self.summary.clone())
                .unwrap_or_else(|| format!("{} {}", self.validator, self.status));
            Some(ValidationBlock { validator: self.validator, reason })
        } else {
            None
        }
    }
}

/// A merge-blocking validator outcome; sends the task to human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationBlock {
    pub validator: ValidatorKind,
    pub reason: String,
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
