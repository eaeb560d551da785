// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path resolution for everything under `MYCELIUM_HOME`.
//!
//! Normative layout:
//!
//! ```text
//! <MYCELIUM_HOME>/
//!   projects/<project>/config.yaml
//!   state/<project>/<runId>.json
//!   workspaces/<project>/<runId>/<task>
//!   logs/<project>/<runId>/
//!     orchestrator.jsonl
//!     tasks/<id>-<slug>/events.jsonl
//!     tasks/<id>-<slug>/doctor-<attempt>.log
//!     validators/<validator>/<id>-<slug>-<attempt>.json
//!   control-plane/models/<sha>/{model.json,metadata.json,.lock}
//!   ledger.json
//! ```

use myc_core::slugify;
use std::path::{Component, Path, PathBuf};

pub const HOME_ENV: &str = "MYCELIUM_HOME";

/// Resolved on-disk layout for one orchestrator home.
///
/// The environment is read exactly once, at construction; every path the
/// system touches is derived from this context.
#[derive(Debug, Clone)]
pub struct PathsContext {
    home: PathBuf,
}

impl PathsContext {
    /// Resolve from the environment: `MYCELIUM_HOME` if set, else
    /// `<repo>/.mycelium`.
    pub fn resolve(repo_path: &Path) -> Self {
        let home = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| repo_path.join(".mycelium"));
        Self { home }
    }

    /// Build from an explicit home directory (tests, `--home` overrides).
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    // --- project config ---

    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.home.join("projects").join(project)
    }

    pub fn project_config(&self, project: &str) -> PathBuf {
        self.project_dir(project).join("config.yaml")
    }

    // --- run state ---

    pub fn state_dir(&self, project: &str) -> PathBuf {
        self.home.join("state").join(project)
    }

    pub fn state_file(&self, project: &str, run_id: &str) -> PathBuf {
        self.state_dir(project).join(format!("{run_id}.json"))
    }

    /// Stop-signal marker polled by the run engine.
    pub fn stop_file(&self, project: &str, run_id: &str) -> PathBuf {
        self.state_dir(project).join(format!("{run_id}.stop"))
    }

    // --- workspaces ---

    pub fn workspaces_base(&self) -> PathBuf {
        self.home.join("workspaces")
    }

    pub fn run_workspace_dir(&self, project: &str, run_id: &str) -> PathBuf {
        self.workspaces_base().join(project).join(run_id)
    }

    pub fn task_workspace_dir(&self, project: &str, run_id: &str, task_id: &str) -> PathBuf {
        self.run_workspace_dir(project, run_id).join(task_id)
    }

    // --- logs ---

    pub fn logs_base(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn run_logs_dir(&self, project: &str, run_id: &str) -> PathBuf {
        self.logs_base().join(project).join(run_id)
    }

    pub fn orchestrator_log(&self, project: &str, run_id: &str) -> PathBuf {
        self.run_logs_dir(project, run_id).join("orchestrator.jsonl")
    }

    /// `logs/<project>/<run>/tasks/<id>-<slug>/`
    pub fn task_logs_dir(
        &self,
        project: &str,
        run_id: &str,
        task_id: &str,
        task_name: &str,
    ) -> PathBuf {
        self.run_logs_dir(project, run_id)
            .join("tasks")
            .join(format!("{task_id}-{}", slugify(task_name, 40)))
    }

    pub fn task_events_log(
        &self,
        project: &str,
        run_id: &str,
        task_id: &str,
        task_name: &str,
    ) -> PathBuf {
        self.task_logs_dir(project, run_id, task_id, task_name).join("events.jsonl")
    }

    pub fn doctor_log(
        &self,
        project: &str,
        run_id: &str,
        task_id: &str,
        task_name: &str,
        attempt: u32,
    ) -> PathBuf {
        self.task_logs_dir(project, run_id, task_id, task_name)
            .join(format!("doctor-{attempt}.log"))
    }

    pub fn validator_report(
        &self,
        project: &str,
        run_id: &str,
        validator: &str,
        task_id: &str,
        task_name: &str,
        attempt: u32,
    ) -> PathBuf {
        self.run_logs_dir(project, run_id)
            .join("validators")
            .join(validator)
            .join(format!("{task_id}-{}-{attempt}.json", slugify(task_name, 40)))
    }

    pub fn run_summary(&self, project: &str, run_id: &str) -> PathBuf {
        self.run_logs_dir(project, run_id).join("summary.json")
    }

    // --- control plane ---

    pub fn models_base(&self) -> PathBuf {
        self.home.join("control-plane").join("models")
    }

    pub fn model_dir(&self, sha: &str) -> PathBuf {
        self.models_base().join(sha)
    }

    // --- ledger ---

    pub fn ledger_path(&self) -> PathBuf {
        self.home.join("ledger.json")
    }
}

/// Lexical containment check used before any deletion under the managed
/// roots. No filesystem access; `..` components in `path` defeat the check
/// and it returns false.
pub fn path_is_within(base: &Path, path: &Path) -> bool {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return false;
    }
    path.starts_with(base)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
