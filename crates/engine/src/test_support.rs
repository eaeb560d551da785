// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for engine tests.
//!
//! Substituted through the capability interfaces so production wiring is
//! untouched: `FakeVcs` simulates the git graph, `FakeWorker` scripts
//! worker attempts per task.

use crate::error::EngineError;
use crate::worker::{WorkerOutcome, WorkerRequest, WorkerRunner};
use async_trait::async_trait;
use myc_vcs::{GitError, MergeOutcome, MergeRequest, Vcs};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Scriptable in-memory stand-in for the git adapter.
#[derive(Default)]
pub struct FakeVcs {
    pub calls: Mutex<Vec<String>>,
    /// Workspaces whose tree reports dirty.
    pub dirty: Mutex<HashSet<PathBuf>>,
    /// Changed files per workspace dir; falls back to `default_changed`.
    pub changed_files: Mutex<HashMap<PathBuf, Vec<String>>>,
    pub default_changed: Mutex<Vec<String>>,
    /// Branches that conflict during the octopus merge.
    pub merge_conflicts: Mutex<HashSet<String>>,
    pub main_sha: Mutex<String>,
    merge_counter: Mutex<u64>,
}

impl FakeVcs {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.main_sha.lock() = "base0000".to_string();
        fake
    }

    pub fn mark_dirty(&self, workspace: &Path) {
        self.dirty.lock().insert(workspace.to_path_buf());
    }

    pub fn set_changed(&self, workspace: &Path, files: &[&str]) {
        self.changed_files
            .lock()
            .insert(workspace.to_path_buf(), files.iter().map(|f| f.to_string()).collect());
    }

    pub fn set_default_changed(&self, files: &[&str]) {
        *self.default_changed.lock() = files.iter().map(|f| f.to_string()).collect();
    }

    pub fn conflict_on(&self, branch: &str) {
        self.merge_conflicts.lock().insert(branch.to_string());
    }

    fn log(&self, entry: String) {
        self.calls.lock().push(entry);
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn ensure_clean_working_tree(&self, repo: &Path) -> Result<(), GitError> {
        if self.dirty.lock().contains(repo) {
            Err(GitError::DirtyWorkingTree { repo: repo.display().to_string() })
        } else {
            Ok(())
        }
    }

    async fn checkout(&self, _repo: &Path, reference: &str) -> Result<(), GitError> {
        self.log(format!("checkout {reference}"));
        Ok(())
    }

    async fn checkout_or_create_branch(
        &self,
        _repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        self.log(format!("branch {branch} from {start_point}"));
        Ok(())
    }

    async fn resolve_run_base_sha(
        &self,
        _repo: &Path,
        _main_branch: &str,
    ) -> Result<String, GitError> {
        Ok(self.main_sha.lock().clone())
    }

    async fn head_sha(&self, _repo: &Path, _reference: &str) -> Result<String, GitError> {
        Ok(self.main_sha.lock().clone())
    }

    async fn is_ancestor(&self, _repo: &Path, _a: &str, _b: &str) -> Result<bool, GitError> {
        Ok(true)
    }

    async fn list_changed_files(
        &self,
        workspace: &Path,
        _base_ref: &str,
    ) -> Result<Vec<String>, GitError> {
        Ok(self
            .changed_files
            .lock()
            .get(workspace)
            .cloned()
            .unwrap_or_else(|| self.default_changed.lock().clone()))
    }

    async fn clone_no_hardlinks(&self, _src: &Path, dst: &Path) -> Result<(), GitError> {
        std::fs::create_dir_all(dst.join(".git")).map_err(|e| GitError::Command {
            op: "clone".into(),
            stderr: e.to_string(),
        })?;
        self.log(format!("clone {}", dst.display()));
        Ok(())
    }

    async fn reset_hard_clean(&self, repo: &Path) -> Result<(), GitError> {
        self.dirty.lock().remove(repo);
        self.log(format!("reset {}", repo.display()));
        Ok(())
    }

    async fn merge_task_branches_to_temp(
        &self,
        request: &MergeRequest,
    ) -> Result<MergeOutcome, GitError> {
        let conflicts_set = self.merge_conflicts.lock();
        let mut merged = Vec::new();
        let mut conflicts = Vec::new();
        for task in &request.branches {
            if conflicts_set.contains(&task.branch) {
                conflicts.push(task.branch.clone());
            } else {
                merged.push(task.branch.clone());
            }
        }
        let mut counter = self.merge_counter.lock();
        *counter += 1;
        Ok(MergeOutcome { merged, conflicts, merge_commit: format!("merge{:04}", *counter) })
    }

    async fn fast_forward(
        &self,
        _repo: &Path,
        _main_branch: &str,
        temp_branch: &str,
    ) -> Result<String, GitError> {
        let new_sha = format!("main-after-{temp_branch}");
        *self.main_sha.lock() = new_sha.clone();
        self.log(format!("ff {temp_branch}"));
        Ok(new_sha)
    }

    async fn delete_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.log(format!("delete {branch}"));
        Ok(())
    }
}

/// Scripted worker: queue outcomes per task id, default success.
#[derive(Default)]
pub struct FakeWorker {
    outcomes: Mutex<HashMap<String, VecDeque<WorkerOutcome>>>,
    reattach: Mutex<HashMap<String, WorkerOutcome>>,
    pub runs: Mutex<Vec<String>>,
    pub reattaches: Mutex<Vec<String>>,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, task_id: &str, outcome: WorkerOutcome) {
        self.outcomes.lock().entry(task_id.to_string()).or_default().push_back(outcome);
    }

    pub fn script_reattach(&self, task_id: &str, outcome: WorkerOutcome) {
        self.reattach.lock().insert(task_id.to_string(), outcome);
    }

    pub fn run_count(&self, task_id: &str) -> usize {
        self.runs.lock().iter().filter(|id| id.as_str() == task_id).count()
    }
}

#[async_trait]
impl WorkerRunner for FakeWorker {
    async fn run(&self, request: &WorkerRequest) -> Result<WorkerOutcome, EngineError> {
        self.runs.lock().push(request.task_id.clone());
        let outcome = self
            .outcomes
            .lock()
            .get_mut(&request.task_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(WorkerOutcome::ok);
        Ok(outcome)
    }

    async fn reattach(
        &self,
        request: &WorkerRequest,
    ) -> Result<Option<WorkerOutcome>, EngineError> {
        self.reattaches.lock().push(request.task_id.clone());
        Ok(self.reattach.lock().remove(&request.task_id))
    }
}
