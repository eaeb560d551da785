// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strict task manifest schema.
//!
//! Unknown keys are rejected so a typo in a declared lock or file list
//! fails at plan time instead of silently widening a task's scope.

use myc_core::LockSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid manifest for task {id}: {reason}")]
    Invalid { id: String, reason: String },
}

impl myc_core::Diagnostic for ManifestError {
    fn code(&self) -> &'static str {
        "TASK_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            ManifestError::Parse { .. } => {
                Some("Manifests use a strict schema; remove unknown keys.".into())
            }
            _ => None,
        }
    }
}

/// TDD enforcement mode for a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TddMode {
    #[default]
    Off,
    Strict,
}

/// Per-task verification commands. `doctor` gates the merge; `fast` is an
/// optional cheaper pre-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Verify {
    pub doctor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast: Option<String>,
}

/// Immutable task manifest, the input contract of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskManifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Logical resource locks enforced by the scheduler.
    #[serde(default)]
    pub locks: LockSet,
    /// Declared file reads/writes, checked by manifest compliance.
    #[serde(default)]
    pub files: LockSet,
    #[serde(default)]
    pub affected_tests: Vec<String>,
    #[serde(default)]
    pub test_paths: Vec<String>,
    #[serde(default)]
    pub tdd_mode: TddMode,
    pub verify: Verify,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint: Option<String>,
}

impl TaskManifest {
    /// Parse and validate a manifest from JSON text.
    pub fn parse(path: &Path, json: &str) -> Result<Self, ManifestError> {
        let manifest: TaskManifest = serde_json::from_str(json)
            .map_err(|source| ManifestError::Parse { path: path.display().to_string(), source })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.display().to_string(), source })?;
        Self::parse(path, &json)
    }

    /// Semantic checks the schema alone cannot express.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |reason: &str| ManifestError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id must be non-empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must be non-empty"));
        }
        if self.estimated_minutes == 0 {
            return Err(invalid("estimated_minutes must be positive"));
        }
        if self.verify.doctor.trim().is_empty() {
            return Err(invalid("verify.doctor must be non-empty"));
        }
        if self.dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(invalid("dependencies must be task ids"));
        }
        if self.dependencies.contains(&self.id) {
            return Err(invalid("task cannot depend on itself"));
        }
        Ok(())
    }

    /// Canonical JSON used for ledger fingerprints. Field order is fixed by
    /// the struct, so serialization is deterministic.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// A copy with `locks.writes` and `files.writes` widened; used by
    /// automatic rescope.
    pub fn rescoped(&self, extra_resources: &[String], extra_files: &[String]) -> Self {
        let mut widened = self.clone();
        widened.locks.writes.extend(extra_resources.iter().cloned());
        widened.locks = widened.locks.normalized();
        widened.files.writes.extend(extra_files.iter().cloned());
        widened.files = widened.files.normalized();
        widened
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
