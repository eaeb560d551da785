// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-level cross-run ledger of completed tasks.
//!
//! The ledger lets a later run skip a task that already merged: the
//! fingerprint ties the exact manifest content to the exact merge commit.

use crate::state_store::StateError;
use myc_core::Clock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LEDGER_SCHEMA_VERSION: u32 = 1;

/// One completed task's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: String,
    pub fingerprint: String,
    pub merge_commit: String,
    pub integration_doctor_passed: bool,
    pub completed_at: String,
    pub run_id: String,
}

/// `ledger.json`: schema version plus task id → entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub schema_version: u32,
    pub updated_at: String,
    #[serde(default)]
    pub tasks: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    fn empty() -> Self {
        Self { schema_version: LEDGER_SCHEMA_VERSION, updated_at: String::new(), tasks: BTreeMap::new() }
    }

    /// `sha256(manifest_canonical + merge_commit)`, hex-encoded.
    pub fn fingerprint(manifest_canonical: &str, merge_commit: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(manifest_canonical.as_bytes());
        hasher.update(merge_commit.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn load_or_default(path: &Path) -> Result<Self, StateError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty())
            }
            Err(source) => {
                return Err(StateError::Io { path: path.display().to_string(), source })
            }
        };
        serde_json::from_str(&json)
            .map_err(|source| StateError::Corrupt { path: path.display().to_string(), source })
    }

    /// Record a merged task and persist atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn record_completed(
        path: &Path,
        task_id: &str,
        manifest_canonical: &str,
        merge_commit: &str,
        integration_doctor_passed: bool,
        run_id: &str,
        clock: &impl Clock,
    ) -> Result<(), StateError> {
        let mut ledger = Self::load_or_default(path)?;
        ledger.tasks.insert(
            task_id.to_string(),
            LedgerEntry {
                status: "complete".into(),
                fingerprint: Self::fingerprint(manifest_canonical, merge_commit),
                merge_commit: merge_commit.to_string(),
                integration_doctor_passed,
                completed_at: clock.iso_ms(),
                run_id: run_id.to_string(),
            },
        );
        ledger.updated_at = clock.iso_ms();
        ledger.save(path)
    }

    /// Whether the ledger already holds this exact manifest's completion.
    /// A changed manifest produces a different fingerprint and re-executes.
    pub fn is_completed(&self, task_id: &str, manifest_canonical: &str) -> bool {
        self.tasks.get(task_id).is_some_and(|entry| {
            entry.status == "complete"
                && entry.fingerprint
                    == Self::fingerprint(manifest_canonical, &entry.merge_commit)
        })
    }

    fn save(&self, path: &Path) -> Result<(), StateError> {
        let display = path.display().to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|source| StateError::Corrupt { path: display.clone(), source })?;
        let tmp: PathBuf = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
            file.write_all(&json)
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
            file.sync_all()
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
        }
        fs::rename(&tmp, path).map_err(|source| StateError::Io { path: display, source })
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
