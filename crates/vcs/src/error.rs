// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed git failures.

use myc_core::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git for `{op}`: {source}")]
    Spawn {
        op: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-conflict git failure: the command exited non-zero.
    #[error("git {op} failed: {stderr}")]
    Command { op: String, stderr: String },

    /// Merge produced conflict markers; detected from `CONFLICT` lines in
    /// stdout rather than the English prose, which is locale-stable.
    #[error("merge of {branch} produced conflicts")]
    MergeConflict { branch: String },

    #[error("working tree at {repo} has uncommitted changes")]
    DirtyWorkingTree { repo: String },

    #[error("git produced unexpected output for `{op}`: {detail}")]
    UnexpectedOutput { op: String, detail: String },
}

impl Diagnostic for GitError {
    fn code(&self) -> &'static str {
        "GIT_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            GitError::DirtyWorkingTree { .. } => {
                Some("Commit or stash your changes, then retry.".into())
            }
            GitError::MergeConflict { .. } => {
                Some("Main was left untouched; resolve the task branch and resume.".into())
            }
            _ => None,
        }
    }
}

impl GitError {
    /// Whether the error is the merge-conflict subtype.
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, GitError::MergeConflict { .. })
    }
}
