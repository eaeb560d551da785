// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared resource locks and the scheduler conflict rule.

use serde::{Deserialize, Serialize};

/// Read/write locks over named logical resources.
///
/// Normalized form: trimmed, deduplicated, sorted. Two lock sets conflict
/// when either writes a resource the other reads or writes; reads may
/// share freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSet {
    #[serde(default)]
    pub reads: Vec<String>,
    #[serde(default)]
    pub writes: Vec<String>,
}

impl LockSet {
    pub fn new(reads: Vec<String>, writes: Vec<String>) -> Self {
        Self { reads, writes }.normalized()
    }

    /// Trim, drop empties, deduplicate, and sort both lists.
    pub fn normalized(&self) -> Self {
        Self { reads: normalize(&self.reads), writes: normalize(&self.writes) }
    }

    /// The scheduler conflict rule: `A.writes ∩ (B.reads ∪ B.writes) ≠ ∅`
    /// or `A.reads ∩ B.writes ≠ ∅`.
    pub fn conflicts_with(&self, other: &LockSet) -> bool {
        let hits = |xs: &[String], ys: &[String]| xs.iter().any(|x| ys.contains(x));
        hits(&self.writes, &other.reads)
            || hits(&self.writes, &other.writes)
            || hits(&self.reads, &other.writes)
    }

    /// Merge another lock set into this one, keeping normalized form.
    pub fn absorb(&mut self, other: &LockSet) {
        self.reads.extend(other.reads.iter().cloned());
        self.writes.extend(other.writes.iter().cloned());
        *self = self.normalized();
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Whether `resource` is declared for write.
    pub fn writes_resource(&self, resource: &str) -> bool {
        self.writes.iter().any(|w| w == resource)
    }
}

fn normalize(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> =
        items.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
#[path = "lock_set_tests.rs"]
mod tests;
