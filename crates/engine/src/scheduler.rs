// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topological, lock-aware batch builder.
//!
//! Pure and deterministic: equal inputs yield equal batches, including
//! member order. Task ids sort under natural-numeric collation, so `"2"`
//! comes before `"10"`.

use myc_core::{Batch, BatchId, LockSet, TaskId};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// What the scheduler needs to know about a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub id: String,
    pub dependencies: Vec<String>,
    pub locks: LockSet,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, dependencies: Vec<String>, locks: LockSet) -> Self {
        Self { id: id.into(), dependencies, locks: locks.normalized() }
    }
}

/// Inputs for one batch-planning step.
pub struct SchedulerInput<'a> {
    pub tasks: &'a [TaskSpec],
    pub completed: &'a BTreeSet<String>,
    pub max_parallel: usize,
}

/// Natural-numeric collation: digit runs compare as numbers, everything
/// else byte-wise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let xn = take_number(&mut ai);
                    let yn = take_number(&mut bi);
                    match xn.cmp(&yn) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match x.cmp(&y) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> (u128, usize) {
    let mut value: u128 = 0;
    let mut digits = 0usize;
    while let Some(c) = iter.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((c as u8 - b'0') as u128);
        digits += 1;
        iter.next();
    }
    // Longer zero-padded runs tie-break after equal values ("07" > "7").
    (value, digits)
}

/// Plan the next batch.
///
/// 1. Ready set: dependencies all completed, sorted by natural id order.
/// 2. Greedy admission: take each ready task whose locks do not conflict
///    with the accumulated batch locks, up to `max_parallel`.
///
/// Returns the batch (empty `task_ids` when nothing is ready) and the
/// ready tasks left out of it.
pub fn plan_batch(input: &SchedulerInput<'_>) -> (Batch, Vec<TaskSpec>) {
    let mut ready: Vec<&TaskSpec> = input
        .tasks
        .iter()
        .filter(|t| !input.completed.contains(&t.id))
        .filter(|t| t.dependencies.iter().all(|d| input.completed.contains(d)))
        .collect();
    ready.sort_by(|a, b| natural_cmp(&a.id, &b.id));

    let mut admitted: Vec<&TaskSpec> = Vec::new();
    let mut remaining: Vec<TaskSpec> = Vec::new();
    let mut batch_locks = LockSet::default();

    for task in ready {
        let full = admitted.len() >= input.max_parallel;
        if !full && !batch_locks.conflicts_with(&task.locks) {
            batch_locks.absorb(&task.locks);
            admitted.push(task);
        } else {
            remaining.push(task.clone());
        }
    }

    let task_ids: Vec<TaskId> = admitted.iter().map(|t| TaskId::new(&t.id)).collect();
    let batch_id = BatchId::new(batch_ident(&task_ids));
    (Batch::new(batch_id, task_ids, batch_locks), remaining)
}

/// Deterministic batch id derived from the member ids.
fn batch_ident(task_ids: &[TaskId]) -> String {
    let joined =
        task_ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join("+");
    format!("bat-{joined}")
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
