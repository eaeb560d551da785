// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git CLI adapter.

use crate::error::GitError;
use async_trait::async_trait;
use myc_core::slugify;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// `<prefix><id>-<slug(name)>`
pub fn build_task_branch_name(prefix: &str, id: &str, name: &str) -> String {
    format!("{prefix}{id}-{}", slugify(name, 40))
}

/// One task branch to merge, fetched from its workspace clone.
#[derive(Debug, Clone)]
pub struct TaskBranch {
    pub branch: String,
    pub workspace: PathBuf,
}

/// Octopus merge request: merge `branches` into `temp_branch` (reset to
/// `main_branch` first), one `--no-ff` merge per branch.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub repo: PathBuf,
    pub main_branch: String,
    pub branches: Vec<TaskBranch>,
    pub temp_branch: String,
}

/// What the octopus produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: Vec<String>,
    pub conflicts: Vec<String>,
    pub merge_commit: String,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Capability interface over git, narrow enough for the engine and
/// substitutable in tests.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn ensure_clean_working_tree(&self, repo: &Path) -> Result<(), GitError>;
    async fn checkout(&self, repo: &Path, reference: &str) -> Result<(), GitError>;
    async fn checkout_or_create_branch(
        &self,
        repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError>;
    async fn resolve_run_base_sha(&self, repo: &Path, main_branch: &str)
        -> Result<String, GitError>;
    async fn head_sha(&self, repo: &Path, reference: &str) -> Result<String, GitError>;
    async fn is_ancestor(&self, repo: &Path, a: &str, b: &str) -> Result<bool, GitError>;
    async fn list_changed_files(
        &self,
        workspace: &Path,
        base_ref: &str,
    ) -> Result<Vec<String>, GitError>;
    async fn clone_no_hardlinks(&self, src: &Path, dst: &Path) -> Result<(), GitError>;
    async fn reset_hard_clean(&self, repo: &Path) -> Result<(), GitError>;
    async fn merge_task_branches_to_temp(
        &self,
        request: &MergeRequest,
    ) -> Result<MergeOutcome, GitError>;
    async fn fast_forward(
        &self,
        repo: &Path,
        main_branch: &str,
        temp_branch: &str,
    ) -> Result<String, GitError>;
    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError>;
}

/// Production adapter: shells out to `git`.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    async fn raw(&self, repo: &Path, args: &[&str]) -> Result<Output, GitError> {
        let op = args.first().copied().unwrap_or("git").to_string();
        Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .output()
            .await
            .map_err(|source| GitError::Spawn { op, source })
    }

    /// Run git, expect success, return trimmed stdout.
    async fn ok(&self, repo: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.raw(repo, args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GitError::Command {
                op: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Detached worktree at `rev`. The caller owns cleanup via
    /// [`Worktree::remove`]; `Drop` is the best-effort fallback.
    pub async fn create_worktree_at_revision(
        &self,
        repo: &Path,
        rev: &str,
        dest: &Path,
    ) -> Result<Worktree, GitError> {
        let dest_str = dest.display().to_string();
        self.ok(repo, &["worktree", "add", "--detach", &dest_str, rev]).await?;
        Ok(Worktree { repo: repo.to_path_buf(), path: dest.to_path_buf(), removed: false })
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn ensure_clean_working_tree(&self, repo: &Path) -> Result<(), GitError> {
        let status = self.ok(repo, &["status", "--porcelain"]).await?;
        if status.is_empty() {
            Ok(())
        } else {
            Err(GitError::DirtyWorkingTree { repo: repo.display().to_string() })
        }
    }

    async fn checkout(&self, repo: &Path, reference: &str) -> Result<(), GitError> {
        self.ok(repo, &["checkout", reference]).await.map(|_| ())
    }

    async fn checkout_or_create_branch(
        &self,
        repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        let verify = format!("refs/heads/{branch}");
        let exists = self
            .raw(repo, &["rev-parse", "--verify", "--quiet", &verify])
            .await?
            .status
            .success();
        if exists {
            self.ok(repo, &["checkout", branch]).await.map(|_| ())
        } else {
            self.ok(repo, &["checkout", "-b", branch, start_point]).await.map(|_| ())
        }
    }

    async fn resolve_run_base_sha(
        &self,
        repo: &Path,
        main_branch: &str,
    ) -> Result<String, GitError> {
        self.head_sha(repo, main_branch).await
    }

    async fn head_sha(&self, repo: &Path, reference: &str) -> Result<String, GitError> {
        let sha = self.ok(repo, &["rev-parse", reference]).await?;
        if sha.len() < 7 {
            return Err(GitError::UnexpectedOutput {
                op: format!("rev-parse {reference}"),
                detail: sha,
            });
        }
        Ok(sha)
    }

    async fn is_ancestor(&self, repo: &Path, a: &str, b: &str) -> Result<bool, GitError> {
        let output = self.raw(repo, &["merge-base", "--is-ancestor", a, b]).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(GitError::Command {
                op: format!("merge-base --is-ancestor {a} {b}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn list_changed_files(
        &self,
        workspace: &Path,
        base_ref: &str,
    ) -> Result<Vec<String>, GitError> {
        let range = format!("{base_ref}...HEAD");
        let diff = self.ok(workspace, &["diff", "--name-status", "-M", &range]).await?;
        let status = self.ok(workspace, &["status", "--porcelain"]).await?;

        let mut files = parse_name_status(&diff);
        files.extend(parse_porcelain(&status));
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn clone_no_hardlinks(&self, src: &Path, dst: &Path) -> Result<(), GitError> {
        let output = Command::new("git")
            .arg("clone")
            .arg("--no-hardlinks")
            .arg(src)
            .arg(dst)
            .output()
            .await
            .map_err(|source| GitError::Spawn { op: "clone".into(), source })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::Command {
                op: "clone --no-hardlinks".into(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn reset_hard_clean(&self, repo: &Path) -> Result<(), GitError> {
        self.ok(repo, &["reset", "--hard"]).await?;
        self.ok(repo, &["clean", "-fdx"]).await.map(|_| ())
    }

    async fn merge_task_branches_to_temp(
        &self,
        request: &MergeRequest,
    ) -> Result<MergeOutcome, GitError> {
        let repo = &request.repo;
        // -B resets a stale temp branch from an earlier crashed merge.
        self.ok(repo, &["checkout", "-B", &request.temp_branch, &request.main_branch]).await?;

        let mut merged = Vec::new();
        let mut conflicts = Vec::new();

        for (index, task) in request.branches.iter().enumerate() {
            let remote = format!("myc-task-{index}");
            let workspace = task.workspace.display().to_string();
            // A stale remote from a crashed run would make `remote add` fail.
            let _ = self.raw(repo, &["remote", "remove", &remote]).await;

            let result = self.merge_one(repo, &remote, &workspace, &task.branch).await;

            // The remote is short-lived regardless of the merge outcome.
            let _ = self.raw(repo, &["remote", "remove", &remote]).await;

            match result {
                Ok(true) => merged.push(task.branch.clone()),
                Ok(false) => conflicts.push(task.branch.clone()),
                Err(err) => return Err(err),
            }
        }

        let merge_commit = self.head_sha(repo, "HEAD").await?;
        Ok(MergeOutcome { merged, conflicts, merge_commit })
    }

    async fn fast_forward(
        &self,
        repo: &Path,
        main_branch: &str,
        temp_branch: &str,
    ) -> Result<String, GitError> {
        self.ok(repo, &["checkout", main_branch]).await?;
        self.ok(repo, &["merge", "--ff-only", temp_branch]).await?;
        self.head_sha(repo, "HEAD").await
    }

    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.ok(repo, &["branch", "-D", branch]).await.map(|_| ())
    }
}

impl GitCli {
    /// Fetch one task branch via a short-lived remote and `--no-ff` merge
    /// it. `Ok(true)` merged, `Ok(false)` conflict (merge aborted).
    async fn merge_one(
        &self,
        repo: &Path,
        remote: &str,
        workspace: &str,
        branch: &str,
    ) -> Result<bool, GitError> {
        self.ok(repo, &["remote", "add", remote, workspace]).await?;
        self.ok(repo, &["fetch", remote, branch]).await?;

        let message = format!("mycelium: merge {branch}");
        let output = self.raw(repo, &["merge", "--no-ff", "-m", &message, "FETCH_HEAD"]).await?;
        if output.status.success() {
            return Ok(true);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("CONFLICT") {
            tracing::warn!(%branch, "merge conflict, aborting this branch");
            let _ = self.raw(repo, &["merge", "--abort"]).await;
            Ok(false)
        } else {
            Err(GitError::Command {
                op: format!("merge --no-ff {branch}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// A detached worktree. Remove explicitly; `Drop` falls back to a blocking
/// best-effort removal so crashed callers do not leak checkouts.
#[derive(Debug)]
pub struct Worktree {
    repo: PathBuf,
    path: PathBuf,
    removed: bool,
}

impl Worktree {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) -> Result<(), GitError> {
        self.removed = true;
        let path = self.path.display().to_string();
        GitCli.ok(&self.repo, &["worktree", "remove", "--force", &path]).await.map(|_| ())
    }
}

impl Drop for Worktree {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = self.path.display().to_string();
        let _ = std::process::Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["worktree", "remove", "--force", &path])
            .output();
    }
}

/// Parse `git diff --name-status -M` output; renames and copies report the
/// destination path.
fn parse_name_status(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let status = fields.next()?.trim();
            if status.is_empty() {
                return None;
            }
            let path = if status.starts_with('R') || status.starts_with('C') {
                fields.nth(1)
            } else {
                fields.next()
            }?;
            Some(normalize_path(path))
        })
        .collect()
}

/// Parse `git status --porcelain`; `XY old -> new` renames report `new`.
fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let path_part = &line[3..];
            let path = match path_part.split_once(" -> ") {
                Some((_, new)) => new,
                None => path_part,
            };
            Some(normalize_path(path.trim()))
        })
        .collect()
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('"').replace('\\', "/")
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
