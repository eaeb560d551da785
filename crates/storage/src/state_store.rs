// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable RunState persistence.
//!
//! One JSON file per run under `state/<project>/`. Saves are atomic
//! (write-to-temp, fsync, rename) and writers hold an OS advisory lock on
//! a sibling `.lock` file, so readers (UI, `myc status`) can load the file
//! lock-free at any time.

use crate::paths::PathsContext;
use fs2::FileExt;
use myc_core::{Diagnostic, RunState};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("no run state found at {path}")]
    NotFound { path: String },

    #[error("run state at {path} is unreadable: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("run state at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run {run_id} is locked by another process")]
    Locked { run_id: String },
}

impl Diagnostic for StateError {
    fn code(&self) -> &'static str {
        "STATE_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            StateError::NotFound { .. } | StateError::Corrupt { .. } => {
                Some("Run `myc resume` again or `myc clean --run-id <id>`.".into())
            }
            StateError::Locked { .. } => {
                Some("Another engine owns this run; stop it before retrying.".into())
            }
            _ => None,
        }
    }
}

/// Guard for the exclusive per-run write lock. The lock is released when
/// the guard drops.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    pub path: PathBuf,
}

/// Reads and writes RunState files for one project.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: PathsContext,
    project: String,
}

impl StateStore {
    pub fn new(paths: PathsContext, project: impl Into<String>) -> Self {
        Self { paths, project: project.into() }
    }

    pub fn state_file(&self, run_id: &str) -> PathBuf {
        self.paths.state_file(&self.project, run_id)
    }

    /// Acquire the exclusive write lock for a run. Only one engine process
    /// may hold this at a time; a second caller gets `Locked`.
    pub fn lock_run(&self, run_id: &str) -> Result<RunLock, StateError> {
        let path = self.paths.state_dir(&self.project).join(format!("{run_id}.lock"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| StateError::Io { path: path.display().to_string(), source })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StateError::Io { path: path.display().to_string(), source })?;
        file.try_lock_exclusive()
            .map_err(|_| StateError::Locked { run_id: run_id.to_string() })?;
        Ok(RunLock { _file: file, path })
    }

    /// Atomic save: serialize to a temp file in the target directory,
    /// fsync, then rename over the destination.
    pub fn save(&self, state: &RunState) -> Result<(), StateError> {
        let path = self.state_file(state.run_id.as_str());
        let display = path.display().to_string();
        let parent = path.parent().ok_or_else(|| StateError::NotFound {
            path: display.clone(),
        })?;
        fs::create_dir_all(parent)
            .map_err(|source| StateError::Io { path: display.clone(), source })?;

        let json = serde_json::to_vec_pretty(state)
            .map_err(|source| StateError::Corrupt { path: display.clone(), source })?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
            file.write_all(&json)
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
            file.sync_all()
                .map_err(|source| StateError::Io { path: display.clone(), source })?;
        }
        fs::rename(&tmp, &path)
            .map_err(|source| StateError::Io { path: display, source })?;
        Ok(())
    }

    pub fn load(&self, run_id: &str) -> Result<RunState, StateError> {
        let path = self.state_file(run_id);
        let display = path.display().to_string();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::NotFound { path: display })
            }
            Err(source) => return Err(StateError::Io { path: display, source }),
        };
        serde_json::from_str(&json).map_err(|source| StateError::Corrupt { path: display, source })
    }

    /// The most recently written run for this project, if any. Used by
    /// `myc resume` without `--run-id`.
    pub fn latest_run_id(&self) -> Result<Option<String>, StateError> {
        let dir = self.paths.state_dir(&self.project);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Io { path: dir.display().to_string(), source })
            }
        };
        let mut newest: Option<(std::time::SystemTime, String)> = None;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(mtime) = meta.modified() else { continue };
            if newest.as_ref().is_none_or(|(t, _)| mtime > *t) {
                newest = Some((mtime, stem.to_string()));
            }
        }
        Ok(newest.map(|(_, id)| id))
    }

    /// All run ids with a state file for this project.
    pub fn run_ids(&self) -> Result<Vec<String>, StateError> {
        let dir = self.paths.state_dir(&self.project);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StateError::Io { path: dir.display().to_string(), source })
            }
        };
        let mut ids: Vec<String> = read_dir
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                if path.extension()? != "json" {
                    return None;
                }
                Some(path.file_stem()?.to_str()?.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
