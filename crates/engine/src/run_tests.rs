// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{FakeVcs, FakeWorker};
use crate::validators::MockValidatorRunner;
use myc_core::FakeClock;
use myc_policy::Component;
use myc_storage::MemorySink;
use std::path::Path;
use tempfile::TempDir;
use yare::parameterized;

struct Fixture {
    engine: Arc<RunEngine<FakeClock>>,
    vcs: Arc<FakeVcs>,
    worker: Arc<FakeWorker>,
    sink: Arc<MemorySink>,
    clock: FakeClock,
    _tmp: TempDir,
}

fn fixture(mutate: impl FnOnce(&mut ProjectConfig)) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();

    let mut config = ProjectConfig::default();
    config.doctor.command = "true".into();
    mutate(&mut config);

    let vcs = Arc::new(FakeVcs::new());
    let worker = Arc::new(FakeWorker::new());
    let sink = Arc::new(MemorySink::default());
    let clock = FakeClock::new();

    let engine = Arc::new(RunEngine {
        paths: PathsContext::with_home(tmp.path().join("home")),
        config,
        project: "demo".into(),
        repo,
        vcs: vcs.clone(),
        worker: worker.clone(),
        validator_runner: Arc::new(MockValidatorRunner),
        sink: sink.clone(),
        clock: clock.clone(),
        model: None,
        cancel: CancellationToken::new(),
    });
    Fixture { engine, vcs, worker, sink, clock, _tmp: tmp }
}

fn manifest(id: &str, deps: &[&str], lock_writes: &[&str]) -> TaskManifest {
    let json = serde_json::json!({
        "id": id,
        "name": format!("task {id}"),
        "estimated_minutes": 5,
        "dependencies": deps,
        "locks": { "writes": lock_writes },
        "verify": { "doctor": "true" }
    });
    TaskManifest::parse(Path::new("manifest.json"), &json.to_string()).unwrap()
}

fn options(run_id: &str) -> RunOptions {
    RunOptions {
        run_id: RunId::new(run_id),
        resume: false,
        max_parallel: None,
        task_ids: vec![],
        reuse_completed: true,
    }
}

fn load_state(fx: &Fixture, run_id: &str) -> RunState {
    StateStore::new(fx.engine.paths.clone(), "demo").load(run_id).unwrap()
}

#[parameterized(
    success_reset_retry = { true, true, RetryPolicy::Retry, false },
    fail_reset_retry = { false, true, RetryPolicy::Retry, true },
    fail_reset_failfast = { false, true, RetryPolicy::FailFast, false },
    fail_noreset_retry = { false, false, RetryPolicy::Retry, false },
    fail_noreset_failfast = { false, false, RetryPolicy::FailFast, false },
    success_noreset_retry = { true, false, RetryPolicy::Retry, false },
    success_reset_failfast = { true, true, RetryPolicy::FailFast, false },
    success_noreset_failfast = { true, false, RetryPolicy::FailFast, false },
)]
fn reset_matrix(success: bool, reset: bool, policy: RetryPolicy, expect: bool) {
    assert_eq!(should_reset_to_pending(success, reset, policy), expect);
}

#[tokio::test]
async fn happy_path_completes_and_merges() {
    let fx = fixture(|_| {});
    let outcome = fx
        .engine
        .execute(&options("run-a"), vec![manifest("1", &[], &[]), manifest("2", &[], &[])])
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Complete));

    let state = load_state(&fx, "run-a");
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Complete));
    assert!(state.tasks.iter().all(|t| t.attempts == 1));
    assert_eq!(state.status, RunStatus::Complete);

    let types = fx.sink.types();
    for expected in [
        "run.start",
        "batch.start",
        "task.start",
        "workspace.prepare.complete",
        "doctor.pass",
        "task.complete",
        "batch.complete",
        "run.complete",
    ] {
        assert!(types.contains(&expected.to_string()), "missing {expected} in {types:?}");
    }

    // Ledger recorded both merges.
    let ledger = Ledger::load_or_default(&fx.engine.paths.ledger_path()).unwrap();
    assert_eq!(ledger.tasks.len(), 2);
}

#[tokio::test]
async fn conflicting_locks_run_in_separate_batches() {
    let fx = fixture(|_| {});
    fx.engine
        .execute(
            &options("run-a"),
            vec![manifest("A", &[], &["db"]), manifest("B", &[], &["db"])],
        )
        .await
        .unwrap();

    let batch_starts =
        fx.sink.types().iter().filter(|t| *t == "batch.start").count();
    assert_eq!(batch_starts, 2);
    let state = load_state(&fx, "run-a");
    assert_eq!(state.batches.len(), 2);
}

#[tokio::test]
async fn worker_retry_resets_then_succeeds() {
    let fx = fixture(|_| {});
    fx.worker.script(
        "1",
        WorkerOutcome {
            success: false,
            reset_to_pending: true,
            ..WorkerOutcome::default()
        },
    );
    let outcome =
        fx.engine.execute(&options("run-a"), vec![manifest("1", &[], &[])]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Complete));

    let state = load_state(&fx, "run-a");
    assert_eq!(state.task("1").unwrap().attempts, 2);
    assert_eq!(fx.worker.run_count("1"), 2);
}

#[tokio::test]
async fn fail_fast_policy_fails_the_task() {
    let fx = fixture(|c| c.retry.policy = RetryPolicy::FailFast);
    fx.worker.script(
        "1",
        WorkerOutcome {
            success: false,
            reset_to_pending: true,
            error: Some("boom".into()),
            ..WorkerOutcome::default()
        },
    );
    let outcome =
        fx.engine.execute(&options("run-a"), vec![manifest("1", &[], &[])]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Failed));

    let state = load_state(&fx, "run-a");
    assert_eq!(state.task("1").unwrap().status, TaskStatus::Failed);
    assert!(fx.sink.types().contains(&"task.failed".to_string()));
    assert_eq!(fx.worker.run_count("1"), 1);
}

#[tokio::test]
async fn merge_conflict_parks_batch_and_keeps_main() {
    let fx = fixture(|_| {});
    let main_before = fx.vcs.main_sha.lock().clone();
    fx.vcs.conflict_on("mycelium/2-task-2");

    fx.engine
        .execute(&options("run-a"), vec![manifest("1", &[], &[]), manifest("2", &[], &[])])
        .await
        .unwrap();

    let state = load_state(&fx, "run-a");
    assert!(state
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::NeedsHumanReview));
    assert_eq!(state.batches[0].status, BatchStatus::Failed);
    assert_eq!(*fx.vcs.main_sha.lock(), main_before, "main must be untouched");
    assert!(fx.sink.types().contains(&"batch.merge_conflict".to_string()));
}

#[tokio::test]
async fn resume_reattaches_live_worker_without_new_attempt() {
    let fx = fixture(|_| {});
    let store = StateStore::new(fx.engine.paths.clone(), "demo");

    // A run that crashed right after the container started.
    let mut state = RunState::new(
        RunId::new("run-a"),
        "demo",
        fx.engine.repo.clone(),
        "main",
        "base0000",
        [TaskId::new("1")],
        &fx.clock,
    );
    state.set_status(RunStatus::Running, &fx.clock).unwrap();
    state.transition_task("1", TaskStatus::Running, &fx.clock).unwrap();
    state.heartbeat("1", &fx.clock);
    let workspace = fx.engine.paths.task_workspace_dir("demo", "run-a", "1");
    std::fs::create_dir_all(&workspace).unwrap();
    if let Some(task) = state.task_mut("1") {
        task.workspace = Some(workspace);
        task.branch = Some("mycelium/1-task-1".into());
        task.container_id = Some("cafe".into());
    }
    store.save(&state).unwrap();

    fx.worker.script_reattach("1", WorkerOutcome::ok());

    let mut opts = options("run-a");
    opts.resume = true;
    let outcome =
        fx.engine.execute(&opts, vec![manifest("1", &[], &[])]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Complete));

    let final_state = load_state(&fx, "run-a");
    assert_eq!(final_state.task("1").unwrap().status, TaskStatus::Complete);
    assert_eq!(final_state.task("1").unwrap().attempts, 1, "reattach is not a new attempt");
    assert_eq!(fx.worker.reattaches.lock().as_slice(), &["1".to_string()]);
    assert_eq!(fx.worker.run_count("1"), 0, "live worker must not be restarted");
}

#[tokio::test]
async fn resume_without_live_worker_resets_and_reruns() {
    let fx = fixture(|_| {});
    let store = StateStore::new(fx.engine.paths.clone(), "demo");

    let mut state = RunState::new(
        RunId::new("run-a"),
        "demo",
        fx.engine.repo.clone(),
        "main",
        "base0000",
        [TaskId::new("1")],
        &fx.clock,
    );
    state.set_status(RunStatus::Running, &fx.clock).unwrap();
    state.transition_task("1", TaskStatus::Running, &fx.clock).unwrap();
    store.save(&state).unwrap();

    // Heartbeat is far in the past by the time resume runs.
    fx.clock.advance(std::time::Duration::from_secs(20 * 60));

    let mut opts = options("run-a");
    opts.resume = true;
    fx.engine.execute(&opts, vec![manifest("1", &[], &[])]).await.unwrap();

    let final_state = load_state(&fx, "run-a");
    assert_eq!(final_state.task("1").unwrap().status, TaskStatus::Complete);
    assert_eq!(final_state.task("1").unwrap().attempts, 2, "stale attempt plus rerun");
    assert_eq!(fx.worker.run_count("1"), 1);
}

#[tokio::test]
async fn budget_block_fails_the_run() {
    let fx = fixture(|c| {
        c.budgets.mode = BudgetMode::Block;
        c.budgets.max_tokens_per_task = 10;
    });
    fx.worker.script(
        "1",
        WorkerOutcome {
            success: true,
            usage: myc_core::TokenUsage { tokens: 500, estimated_cost: 1.0 },
            ..WorkerOutcome::default()
        },
    );
    let outcome =
        fx.engine.execute(&options("run-a"), vec![manifest("1", &[], &[])]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Failed));
    assert!(fx.sink.types().contains(&"budget.block".to_string()));
}

#[tokio::test]
async fn compliance_block_rescopes_once_then_completes() {
    let fx = {
        let mut fx = fixture(|c| c.manifest_enforcement = myc_core::ValidatorMode::Block);
        let engine = Arc::get_mut(&mut fx.engine).unwrap();
        engine.model = Some(ControlPlaneModel::new(
            vec![
                Component { name: "auth".into(), roots: vec!["services/auth".into()] },
                Component { name: "billing".into(), roots: vec!["services/billing".into()] },
            ],
            None,
        ));
        fx
    };
    fx.vcs.set_default_changed(&["services/billing/src/invoice.rs"]);

    // Declared scope covers auth only; the worker touched billing.
    let manifest = {
        let json = serde_json::json!({
            "id": "1",
            "name": "auth change",
            "estimated_minutes": 5,
            "locks": { "writes": ["auth"] },
            "files": { "writes": ["services/auth", "services/billing"] },
            "verify": { "doctor": "true" }
        });
        TaskManifest::parse(Path::new("manifest.json"), &json.to_string()).unwrap()
    };

    let outcome = fx.engine.execute(&options("run-a"), vec![manifest]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Complete));

    let state = load_state(&fx, "run-a");
    assert_eq!(state.task("1").unwrap().status, TaskStatus::Complete);
    assert_eq!(state.task("1").unwrap().attempts, 2, "one rescope rerun");
    assert!(fx.sink.types().contains(&"manifest.compliance.block".to_string()));
}

#[tokio::test]
async fn unmapped_violation_goes_to_human_review() {
    let fx = {
        let mut fx = fixture(|c| c.manifest_enforcement = myc_core::ValidatorMode::Block);
        let engine = Arc::get_mut(&mut fx.engine).unwrap();
        engine.model = Some(ControlPlaneModel::new(
            vec![Component { name: "auth".into(), roots: vec!["services/auth".into()] }],
            None,
        ));
        fx
    };
    fx.vcs.set_default_changed(&["mystery/script.sh"]);

    fx.engine.execute(&options("run-a"), vec![manifest("1", &[], &["auth"])]).await.unwrap();

    let state = load_state(&fx, "run-a");
    assert_eq!(state.task("1").unwrap().status, TaskStatus::NeedsHumanReview);
    assert!(fx.sink.types().contains(&"task.rescope.failed".to_string()));
}

#[tokio::test]
async fn doctor_block_sends_task_to_review() {
    let fx = fixture(|_| {});
    // The task's own doctor command gates the merge.
    let failing = {
        let json = serde_json::json!({
            "id": "1",
            "name": "task 1",
            "estimated_minutes": 5,
            "verify": { "doctor": "false" }
        });
        TaskManifest::parse(Path::new("manifest.json"), &json.to_string()).unwrap()
    };
    fx.engine.execute(&options("run-a"), vec![failing]).await.unwrap();

    let state = load_state(&fx, "run-a");
    let task = state.task("1").unwrap();
    assert_eq!(task.status, TaskStatus::NeedsHumanReview);
    assert!(task.human_review.as_deref().unwrap_or_default().starts_with("doctor"));
    assert!(fx.sink.types().contains(&"doctor.fail".to_string()));
}

#[tokio::test]
async fn stop_file_pauses_the_run() {
    let fx = fixture(|_| {});
    let stop = fx.engine.paths.stop_file("demo", "run-a");
    std::fs::create_dir_all(stop.parent().unwrap()).unwrap();
    std::fs::write(&stop, "").unwrap();

    let outcome =
        fx.engine.execute(&options("run-a"), vec![manifest("1", &[], &[])]).await.unwrap();
    match outcome {
        RunOutcome::Stopped(result) => {
            assert_eq!(result.containers, "left_running");
            assert!(!result.stop_containers_requested);
        }
        other => panic!("expected stop, got {other:?}"),
    }
    let state = load_state(&fx, "run-a");
    assert_eq!(state.status, RunStatus::Paused);
    assert_eq!(fx.worker.run_count("1"), 0);
    assert!(fx.sink.types().contains(&"run.stop".to_string()));
}

#[tokio::test]
async fn ledger_short_circuits_completed_tasks() {
    let fx = fixture(|_| {});
    let m = manifest("1", &[], &[]);
    Ledger::record_completed(
        &fx.engine.paths.ledger_path(),
        "1",
        &m.canonical_json(),
        "deadbeef",
        true,
        "run-earlier",
        &fx.clock,
    )
    .unwrap();

    let outcome = fx.engine.execute(&options("run-b"), vec![m]).await.unwrap();
    assert_eq!(outcome, RunOutcome::Finished(RunStatus::Complete));
    assert_eq!(fx.worker.run_count("1"), 0, "ledger hit must skip execution");

    let state = load_state(&fx, "run-b");
    assert_eq!(state.task("1").unwrap().status, TaskStatus::Complete);
    assert!(state.task("1").unwrap().override_record.is_some());
}

#[tokio::test]
async fn dependency_order_across_batches() {
    let fx = fixture(|_| {});
    fx.engine
        .execute(
            &options("run-a"),
            vec![manifest("2", &["1"], &[]), manifest("1", &[], &[])],
        )
        .await
        .unwrap();

    let runs = fx.worker.runs.lock().clone();
    assert_eq!(runs, vec!["1".to_string(), "2".to_string()]);
}
