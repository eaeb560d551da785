// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch of conflict-free tasks scheduled together.

use crate::lock_set::LockSet;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a scheduled batch.
    pub struct BatchId("bat-");
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Pending,
    Running,
    Merged,
    Failed,
}

crate::simple_display! {
    BatchStatus {
        Pending => "pending",
        Running => "running",
        Merged => "merged",
        Failed => "failed",
    }
}

/// A maximal set of ready tasks with pairwise non-conflicting locks.
///
/// The lock set is the normalized union of member locks; conflict-freedom
/// is guaranteed by construction in the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: BatchId,
    pub task_ids: Vec<TaskId>,
    pub locks: LockSet,
    pub status: BatchStatus,
}

impl Batch {
    pub fn new(batch_id: BatchId, task_ids: Vec<TaskId>, locks: LockSet) -> Self {
        Self { batch_id, task_ids, locks, status: BatchStatus::Pending }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.task_ids.contains(id)
    }
}
