// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn locks(reads: &[&str], writes: &[&str]) -> LockSet {
    LockSet::new(
        reads.iter().map(|s| s.to_string()).collect(),
        writes.iter().map(|s| s.to_string()).collect(),
    )
}

fn task(id: &str, deps: &[&str], reads: &[&str], writes: &[&str]) -> TaskSpec {
    TaskSpec::new(id, deps.iter().map(|s| s.to_string()).collect(), locks(reads, writes))
}

fn plan(tasks: &[TaskSpec], completed: &[&str], max_parallel: usize) -> (Batch, Vec<TaskSpec>) {
    let completed: BTreeSet<String> = completed.iter().map(|s| s.to_string()).collect();
    plan_batch(&SchedulerInput { tasks, completed: &completed, max_parallel })
}

fn ids(batch: &Batch) -> Vec<&str> {
    batch.task_ids.iter().map(TaskId::as_str).collect()
}

#[parameterized(
    numeric = { "2", "10", std::cmp::Ordering::Less },
    equal = { "7", "7", std::cmp::Ordering::Equal },
    mixed = { "task-2", "task-10", std::cmp::Ordering::Less },
    alpha = { "a", "b", std::cmp::Ordering::Less },
    prefix = { "1", "1a", std::cmp::Ordering::Less },
    zero_padded = { "7", "07", std::cmp::Ordering::Less },
)]
fn natural_collation(a: &str, b: &str, expected: std::cmp::Ordering) {
    assert_eq!(natural_cmp(a, b), expected);
}

#[test]
fn writer_excludes_readers_in_first_batch() {
    // Seeded scenario: A writes db; B and C read db; maxParallel=3.
    let tasks = vec![
        task("A", &[], &[], &["db"]),
        task("B", &[], &["db"], &[]),
        task("C", &[], &["db"], &[]),
    ];
    let (first, remaining) = plan(&tasks, &[], 3);
    assert_eq!(ids(&first), vec!["A"]);
    assert_eq!(remaining.len(), 2);

    let (second, rest) = plan(&tasks, &["A"], 3);
    assert_eq!(ids(&second), vec!["B", "C"]);
    assert!(rest.is_empty());
}

#[test]
fn readers_share_a_batch() {
    let tasks = vec![task("1", &[], &["db"], &[]), task("2", &[], &["db"], &[])];
    let (batch, remaining) = plan(&tasks, &[], 4);
    assert_eq!(ids(&batch), vec!["1", "2"]);
    assert!(remaining.is_empty());
}

#[test]
fn dependencies_gate_readiness() {
    let tasks = vec![task("1", &[], &[], &[]), task("2", &["1"], &[], &[])];
    let (batch, remaining) = plan(&tasks, &[], 4);
    assert_eq!(ids(&batch), vec!["1"]);
    // "2" is not ready, so it is not in remaining either.
    assert!(remaining.is_empty());

    let (next, _) = plan(&tasks, &["1"], 4);
    assert_eq!(ids(&next), vec!["2"]);
}

#[test]
fn max_parallel_caps_admission() {
    let tasks = vec![
        task("1", &[], &[], &[]),
        task("2", &[], &[], &[]),
        task("3", &[], &[], &[]),
    ];
    let (batch, remaining) = plan(&tasks, &[], 2);
    assert_eq!(ids(&batch), vec!["1", "2"]);
    assert_eq!(remaining[0].id, "3");
}

#[test]
fn natural_order_admits_two_before_ten() {
    let tasks = vec![task("10", &[], &[], &["db"]), task("2", &[], &[], &["db"])];
    let (batch, _) = plan(&tasks, &[], 4);
    assert_eq!(ids(&batch), vec!["2"]);
}

#[test]
fn batch_locks_are_sorted_union() {
    let tasks = vec![task("1", &[], &["b"], &["a"]), task("2", &[], &["c"], &[])];
    let (batch, _) = plan(&tasks, &[], 4);
    assert_eq!(batch.locks.reads, vec!["b", "c"]);
    assert_eq!(batch.locks.writes, vec!["a"]);
}

#[test]
fn completed_tasks_are_never_rescheduled() {
    let tasks = vec![task("1", &[], &[], &[])];
    let (batch, remaining) = plan(&tasks, &["1"], 4);
    assert!(batch.task_ids.is_empty());
    assert!(remaining.is_empty());
}

#[test]
fn deterministic_batch_id() {
    let tasks = vec![task("1", &[], &[], &[]), task("2", &[], &[], &[])];
    let (a, _) = plan(&tasks, &[], 4);
    let (b, _) = plan(&tasks, &[], 4);
    assert_eq!(a.batch_id, b.batch_id);
    assert_eq!(a, b);
}

proptest! {
    /// Scheduler safety: no two admitted tasks conflict, pairwise.
    #[test]
    fn admitted_tasks_are_pairwise_conflict_free(
        specs in proptest::collection::vec(
            (0u8..6, proptest::collection::vec(0u8..4, 0..3), proptest::collection::vec(0u8..4, 0..3)),
            0..12,
        )
    ) {
        let tasks: Vec<TaskSpec> = specs
            .iter()
            .enumerate()
            .map(|(i, (_, reads, writes))| {
                TaskSpec::new(
                    format!("{i}"),
                    vec![],
                    LockSet::new(
                        reads.iter().map(|r| format!("r{r}")).collect(),
                        writes.iter().map(|w| format!("r{w}")).collect(),
                    ),
                )
            })
            .collect();
        let completed = BTreeSet::new();
        let (batch, _) = plan_batch(&SchedulerInput { tasks: &tasks, completed: &completed, max_parallel: 8 });

        let admitted: Vec<&TaskSpec> = batch
            .task_ids
            .iter()
            .map(|id| tasks.iter().find(|t| t.id == *id.as_str()).unwrap())
            .collect();
        for (i, a) in admitted.iter().enumerate() {
            for b in admitted.iter().skip(i + 1) {
                prop_assert!(!a.locks.conflicts_with(&b.locks));
            }
        }
    }
}
