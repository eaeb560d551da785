// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task working-copy lifecycle.
//!
//! Each task gets its own clone of the repository under
//! `workspaces/<project>/<run>/<task>`. Removal verifies lexical
//! containment inside the workspaces base before deleting anything.

use crate::error::EngineError;
use myc_storage::{path_is_within, PathsContext};
use myc_vcs::Vcs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a workspace came to be ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOutcome {
    pub created: bool,
    pub recovered: bool,
}

pub struct WorkspaceManager {
    paths: PathsContext,
    vcs: Arc<dyn Vcs>,
}

impl WorkspaceManager {
    pub fn new(paths: PathsContext, vcs: Arc<dyn Vcs>) -> Self {
        Self { paths, vcs }
    }

    /// Clone (if missing), optionally recover a dirty tree, and check out
    /// the task branch off the main branch.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_task_workspace(
        &self,
        project: &str,
        run_id: &str,
        task_id: &str,
        repo: &Path,
        main_branch: &str,
        task_branch: &str,
        recover_dirty: bool,
    ) -> Result<(PathBuf, PrepareOutcome), EngineError> {
        let dir = self.paths.task_workspace_dir(project, run_id, task_id);
        let mut outcome = PrepareOutcome::default();

        if !dir.join(".git").is_dir() {
            if let Some(parent) = dir.parent() {
                std::fs::create_dir_all(parent).map_err(|e| EngineError::Workspace {
                    message: format!("creating {}: {e}", parent.display()),
                })?;
            }
            self.vcs.clone_no_hardlinks(repo, &dir).await?;
            outcome.created = true;
        } else if recover_dirty && self.vcs.ensure_clean_working_tree(&dir).await.is_err() {
            tracing::warn!(workspace = %dir.display(), "recovering dirty workspace");
            self.vcs.reset_hard_clean(&dir).await?;
            outcome.recovered = true;
        }

        self.vcs.checkout_or_create_branch(&dir, task_branch, main_branch).await?;
        Ok((dir, outcome))
    }

    pub fn remove_task_workspace(
        &self,
        project: &str,
        run_id: &str,
        task_id: &str,
    ) -> Result<(), EngineError> {
        let dir = self.paths.task_workspace_dir(project, run_id, task_id);
        self.remove_contained(&dir)
    }

    pub fn remove_run_workspace(&self, project: &str, run_id: &str) -> Result<(), EngineError> {
        let dir = self.paths.run_workspace_dir(project, run_id);
        self.remove_contained(&dir)
    }

    fn remove_contained(&self, dir: &Path) -> Result<(), EngineError> {
        let base = self.paths.workspaces_base();
        if !path_is_within(&base, dir) {
            return Err(EngineError::PathEscape {
                path: dir.display().to_string(),
                base: base.display().to_string(),
            });
        }
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| EngineError::Workspace {
                message: format!("removing {}: {e}", dir.display()),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
