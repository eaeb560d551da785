// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk task layout discovery.
//!
//! Modern layout:
//!
//! ```text
//! <tasks_dir>/backlog/<id>-<slug>/manifest.json
//! <tasks_dir>/active/<id>-<slug>/manifest.json
//! <tasks_dir>/archive/<id>-<slug>/manifest.json
//! ```
//!
//! Legacy layout is a flat directory of `<id>-<slug>/manifest.json`. The
//! index merges live and archived tasks, preferring live when both exist.

use crate::manifest::{ManifestError, TaskManifest};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LIVE_BUCKETS: &[&str] = &["backlog", "active"];
const ARCHIVE_BUCKET: &str = "archive";

/// Which layout a tasks directory uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Modern,
    LegacyFlat,
}

/// One discovered task directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEntry {
    pub id: String,
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub archived: bool,
}

/// Index of all tasks under a tasks directory, keyed by id.
#[derive(Debug, Default)]
pub struct TaskIndex {
    entries: BTreeMap<String, TaskEntry>,
    kind: Option<LayoutKind>,
}

impl TaskIndex {
    /// Detect the layout: any of the modern bucket directories makes the
    /// tree modern; otherwise it is treated as legacy flat.
    pub fn detect_layout(tasks_dir: &Path) -> LayoutKind {
        let modern = LIVE_BUCKETS
            .iter()
            .chain(std::iter::once(&ARCHIVE_BUCKET))
            .any(|bucket| tasks_dir.join(bucket).is_dir());
        if modern {
            LayoutKind::Modern
        } else {
            LayoutKind::LegacyFlat
        }
    }

    /// Build the index for a tasks directory.
    pub fn build(tasks_dir: &Path) -> Result<Self, ManifestError> {
        let kind = Self::detect_layout(tasks_dir);
        let mut index = TaskIndex { entries: BTreeMap::new(), kind: Some(kind) };

        match kind {
            LayoutKind::Modern => {
                // Archived first so a live entry with the same id wins.
                index.scan_bucket(&tasks_dir.join(ARCHIVE_BUCKET), true)?;
                for bucket in LIVE_BUCKETS {
                    index.scan_bucket(&tasks_dir.join(bucket), false)?;
                }
            }
            LayoutKind::LegacyFlat => {
                index.scan_bucket(tasks_dir, false)?;
            }
        }

        tracing::debug!(
            tasks_dir = %tasks_dir.display(),
            layout = ?kind,
            count = index.entries.len(),
            "built task index"
        );
        Ok(index)
    }

    fn scan_bucket(&mut self, dir: &Path, archived: bool) -> Result<(), ManifestError> {
        if !dir.is_dir() {
            return Ok(());
        }
        let read_dir = std::fs::read_dir(dir).map_err(|source| ManifestError::Read {
            path: dir.display().to_string(),
            source,
        })?;
        for entry in read_dir.flatten() {
            let task_dir = entry.path();
            let manifest_path = task_dir.join("manifest.json");
            if !manifest_path.is_file() {
                continue;
            }
            // The directory name is `<id>-<slug>`; the manifest is the
            // source of truth for the id.
            let manifest = TaskManifest::load(&manifest_path)?;
            self.entries.insert(
                manifest.id.clone(),
                TaskEntry { id: manifest.id, dir: task_dir, manifest_path, archived },
            );
        }
        Ok(())
    }

    pub fn kind(&self) -> Option<LayoutKind> {
        self.kind
    }

    pub fn get(&self, id: &str) -> Option<&TaskEntry> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load manifests for the given ids (or all live tasks when `ids` is
    /// empty), erroring on the first id with no manifest on disk.
    pub fn load_manifests(&self, ids: &[String]) -> Result<Vec<TaskManifest>, ManifestError> {
        let wanted: Vec<&TaskEntry> = if ids.is_empty() {
            self.entries.values().filter(|e| !e.archived).collect()
        } else {
            ids.iter()
                .map(|id| {
                    self.entries.get(id).ok_or_else(|| ManifestError::Invalid {
                        id: id.clone(),
                        reason: "no manifest found on disk".into(),
                    })
                })
                .collect::<Result<_, _>>()?
        };
        wanted.iter().map(|e| TaskManifest::load(&e.manifest_path)).collect()
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
