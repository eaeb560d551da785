// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run engine: batches, worker lifecycle, gating, merge, resume.
//!
//! One engine instance drives one run. All state mutations go through the
//! shared `RunState` behind a mutex and are checkpointed to disk after
//! every phase, so a crash at any point resumes cleanly.

use crate::compliance::{self, ComplianceOutcome};
use crate::error::EngineError;
use crate::scheduler::{plan_batch, SchedulerInput, TaskSpec};
use crate::validators::{DoctorRunner, ValidatorPipeline, ValidatorRequest, ValidatorRunner};
use crate::worker::{WorkerOutcome, WorkerRequest, WorkerRunner};
use crate::workspace::WorkspaceManager;
use myc_core::{
    Batch, BatchStatus, Clock, Diagnostic, Event, EventRecord, RunId, RunState, RunStatus,
    TaskId, TaskStatus,
};
use myc_policy::{BlastRadius, ChecksetInput, ControlPlaneModel, PolicyDecision, SurfaceDetector};
use myc_storage::{
    BudgetMode, Ledger, LogSink, PathsContext, ProjectConfig, RetryPolicy, StateStore,
};
use myc_tasks::TaskManifest;
use myc_vcs::{build_task_branch_name, MergeRequest, TaskBranch, Vcs};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Running tasks with no heartbeat for longer than this are reset to
/// pending on resume.
pub const STALE_HEARTBEAT: Duration = Duration::from_secs(15 * 60);

/// Retry decision for a finished worker attempt.
///
/// A reset happens only when the worker failed, asked for one, and the
/// project policy allows retries; every other combination is terminal
/// (or a success).
pub fn should_reset_to_pending(
    worker_success: bool,
    reset_to_pending: bool,
    policy: RetryPolicy,
) -> bool {
    !worker_success && reset_to_pending && policy == RetryPolicy::Retry
}

/// Per-run invocation options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_id: RunId,
    pub resume: bool,
    pub max_parallel: Option<usize>,
    /// Restrict to these task ids (empty = all live tasks).
    pub task_ids: Vec<String>,
    /// `false` forces completed tasks to run again.
    pub reuse_completed: bool,
}

/// Well-formed result of a stop signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedResult {
    pub signal: String,
    pub containers: String,
    pub stop_containers_requested: bool,
}

/// How a run invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished(RunStatus),
    Stopped(StoppedResult),
}

/// Everything the engine needs, injected through capability interfaces.
pub struct RunEngine<C: Clock> {
    pub paths: PathsContext,
    pub config: ProjectConfig,
    pub project: String,
    pub repo: PathBuf,
    pub vcs: Arc<dyn Vcs>,
    pub worker: Arc<dyn WorkerRunner>,
    pub validator_runner: Arc<dyn ValidatorRunner>,
    pub sink: Arc<dyn LogSink>,
    pub clock: C,
    pub model: Option<ControlPlaneModel>,
    pub cancel: CancellationToken,
}

struct TaskFlow {
    manifests: Mutex<HashMap<String, TaskManifest>>,
    /// Tasks that already consumed their one automatic rescope.
    rescoped: Mutex<BTreeSet<String>>,
}

impl<C: Clock> RunEngine<C> {
    fn emit(&self, run_id: &RunId, task: Option<&str>, attempt: Option<u32>, event: Event) {
        self.sink.append(EventRecord {
            ts: self.clock.iso_ms(),
            run_id: run_id.clone(),
            task_id: task.map(str::to_string),
            attempt,
            event,
        });
    }

    fn checkpoint(&self, store: &StateStore, state: &Mutex<RunState>) -> Result<(), EngineError> {
        let snapshot = state.lock().clone();
        store.save(&snapshot)?;
        Ok(())
    }

    fn stop_requested(&self, run_id: &RunId) -> bool {
        self.cancel.is_cancelled()
            || self.paths.stop_file(&self.project, run_id.as_str()).exists()
    }

    /// Drive a run to a terminal state (or a stop).
    pub async fn execute(
        self: &Arc<Self>,
        options: &RunOptions,
        manifests: Vec<TaskManifest>,
    ) -> Result<RunOutcome, EngineError> {
        let run_id = options.run_id.clone();
        let store = StateStore::new(self.paths.clone(), &self.project);
        let _lock = store.lock_run(run_id.as_str())?;

        let state = Arc::new(Mutex::new(self.load_or_create(&store, options, &manifests).await?));
        let flow = Arc::new(TaskFlow {
            manifests: Mutex::new(
                manifests.iter().map(|m| (m.id.clone(), m.clone())).collect(),
            ),
            rescoped: Mutex::new(BTreeSet::new()),
        });

        {
            let mut s = state.lock();
            if s.status == RunStatus::Pending {
                s.set_status(RunStatus::Running, &self.clock)?;
            } else if s.status == RunStatus::Paused {
                s.set_status(RunStatus::Running, &self.clock)?;
            }
        }
        self.checkpoint(&store, &state)?;

        let max_parallel = options.max_parallel.unwrap_or(self.config.max_parallel).max(1);
        self.emit(
            &run_id,
            None,
            None,
            Event::RunStart { max_parallel, task_count: state.lock().tasks.len() },
        );

        self.worker.prepare().await?;

        if options.resume {
            self.reconcile_running_tasks(&run_id, &store, &state, &flow).await?;
        }

        loop {
            if self.stop_requested(&run_id) {
                return Ok(RunOutcome::Stopped(self.stop(&run_id, &store, &state).await?));
            }

            // Merge anything already validated (previous batch, or work
            // recovered by resume) before planning more.
            self.merge_validated(&run_id, &store, &state, &flow, None).await?;

            let (batch, _remaining) = {
                let s = state.lock();
                let completed = s.completed_ids();
                let specs: Vec<TaskSpec> = {
                    let manifests = flow.manifests.lock();
                    s.tasks
                        .iter()
                        .filter(|t| t.status == TaskStatus::Pending)
                        .filter_map(|t| manifests.get(t.id.as_str()))
                        .map(|m| {
                            TaskSpec::new(m.id.clone(), m.dependencies.clone(), m.locks.clone())
                        })
                        .collect()
                };
                plan_batch(&SchedulerInput { tasks: &specs, completed: &completed, max_parallel })
            };

            if batch.task_ids.is_empty() {
                break;
            }

            {
                let mut s = state.lock();
                let mut record = batch.clone();
                record.status = BatchStatus::Running;
                s.batches.push(record);
            }
            self.emit(
                &run_id,
                None,
                None,
                Event::BatchStart {
                    batch_id: batch.batch_id.to_string(),
                    task_ids: batch.task_ids.iter().map(ToString::to_string).collect(),
                },
            );
            self.checkpoint(&store, &state)?;

            // One unit of concurrency per task, results gathered before the
            // batch merges.
            let mut handles = Vec::new();
            for task_id in &batch.task_ids {
                if self.stop_requested(&run_id) {
                    break;
                }
                let engine = Arc::clone(self);
                let state = Arc::clone(&state);
                let flow = Arc::clone(&flow);
                let store = store.clone();
                let run_id = run_id.clone();
                let task_id = task_id.clone();
                handles.push(tokio::spawn(async move {
                    engine.run_one_task(&run_id, &store, &state, &flow, &task_id).await;
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }

            let budget_blown = self.enforce_budgets(&run_id, &state);
            self.merge_validated(&run_id, &store, &state, &flow, Some(&batch)).await?;
            self.write_summary(&state);
            self.checkpoint(&store, &state)?;

            if budget_blown {
                state.lock().set_status(RunStatus::Failed, &self.clock)?;
                self.checkpoint(&store, &state)?;
                self.emit(&run_id, None, None, Event::RunComplete { status: "failed".into() });
                return Ok(RunOutcome::Finished(RunStatus::Failed));
            }
        }

        let final_status = {
            let mut s = state.lock();
            let any_failed = s.tasks.iter().any(|t| t.status == TaskStatus::Failed);
            let target = if any_failed { RunStatus::Failed } else { RunStatus::Complete };
            if s.status == RunStatus::Running {
                s.set_status(target, &self.clock)?;
            }
            s.status
        };
        self.write_summary(&state);
        self.checkpoint(&store, &state)?;
        self.emit(&run_id, None, None, Event::RunComplete { status: final_status.to_string() });
        Ok(RunOutcome::Finished(final_status))
    }

    async fn load_or_create(
        &self,
        store: &StateStore,
        options: &RunOptions,
        manifests: &[TaskManifest],
    ) -> Result<RunState, EngineError> {
        if options.resume {
            return Ok(store.load(options.run_id.as_str())?);
        }

        self.vcs.ensure_clean_working_tree(&self.repo).await?;
        let base_sha = self.vcs.resolve_run_base_sha(&self.repo, &self.config.main_branch).await?;
        let mut state = RunState::new(
            options.run_id.clone(),
            &self.project,
            self.repo.clone(),
            &self.config.main_branch,
            base_sha,
            manifests.iter().map(|m| TaskId::new(&m.id)),
            &self.clock,
        );

        // Cross-run ledger: skip tasks whose exact manifest already merged.
        if options.reuse_completed {
            let ledger = Ledger::load_or_default(&self.paths.ledger_path())?;
            for manifest in manifests {
                if ledger.is_completed(&manifest.id, &manifest.canonical_json()) {
                    state.override_task(
                        &manifest.id,
                        TaskStatus::Complete,
                        "completed in a previous run (ledger)",
                        &self.clock,
                    )?;
                }
            }
        }
        Ok(state)
    }

    /// Resume reconciliation: reattach live containers, reset everything
    /// else that claims to be running.
    async fn reconcile_running_tasks(
        self: &Arc<Self>,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        flow: &Arc<TaskFlow>,
    ) -> Result<(), EngineError> {
        let running: Vec<(String, u32, Option<PathBuf>, Option<u64>)> = state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| (t.id.to_string(), t.attempts, t.workspace.clone(), t.heartbeat_ms))
            .collect();

        for (task_id, attempt, workspace, heartbeat_ms) in running {
            let stale = heartbeat_ms.is_none_or(|hb| {
                self.clock.epoch_ms().saturating_sub(hb) > STALE_HEARTBEAT.as_millis() as u64
            });
            let request = WorkerRequest {
                project: self.project.clone(),
                run_id: run_id.to_string(),
                task_id: task_id.clone(),
                task_name: flow.task_name(&task_id),
                attempt,
                workspace: workspace.unwrap_or_default(),
                branch: String::new(),
                inputs: HashMap::new(),
                cancel: self.cancel.clone(),
            };

            match self.worker.reattach(&request).await? {
                Some(outcome) => {
                    tracing::info!(%task_id, "reattached to live worker");
                    self.settle_worker_outcome(run_id, store, state, &task_id, outcome)?;
                }
                None => {
                    tracing::info!(%task_id, stale, "no live worker; resetting to pending");
                    state.lock().transition_task(&task_id, TaskStatus::Pending, &self.clock)?;
                    self.checkpoint(store, state)?;
                }
            }
        }
        Ok(())
    }

    /// One task's full attempt: workspace, worker, gates.
    async fn run_one_task(
        self: &Arc<Self>,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        flow: &Arc<TaskFlow>,
        task_id: &TaskId,
    ) {
        if let Err(err) = self.try_run_one_task(run_id, store, state, flow, task_id).await {
            tracing::error!(task = %task_id, error = %err, "task attempt failed");
            self.emit(
                run_id,
                Some(task_id.as_str()),
                None,
                Event::TaskFailed { code: err.code().into(), error: err.to_string() },
            );
            let mut s = state.lock();
            if s.task(task_id.as_str()).map(|t| t.status) == Some(TaskStatus::Running) {
                let _ = s.transition_task(task_id.as_str(), TaskStatus::Failed, &self.clock);
            }
            drop(s);
            let _ = self.checkpoint(store, state);
        }
    }

    async fn try_run_one_task(
        self: &Arc<Self>,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        flow: &Arc<TaskFlow>,
        task_id: &TaskId,
    ) -> Result<(), EngineError> {
        let id = task_id.as_str();
        let manifest = flow
            .manifests
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| myc_core::TaskError::ManifestMissing { id: id.to_string() })?;

        // Idempotence: a completed task is a no-op.
        if state.lock().task(id).map(|t| t.status) == Some(TaskStatus::Complete) {
            return Ok(());
        }

        let branch =
            build_task_branch_name(&self.config.branch_prefix, &manifest.id, &manifest.name);

        {
            let mut s = state.lock();
            s.transition_task(id, TaskStatus::Running, &self.clock)?;
            s.heartbeat(id, &self.clock);
            if let Some(task) = s.task_mut(id) {
                task.branch = Some(branch.clone());
            }
        }
        let attempt = state.lock().task(id).map(|t| t.attempts).unwrap_or(1);
        self.emit(run_id, Some(id), Some(attempt), Event::TaskStart { branch: branch.clone() });
        self.checkpoint(store, state)?;

        // Workspace phase.
        let workspaces = WorkspaceManager::new(self.paths.clone(), Arc::clone(&self.vcs));
        let expected_dir = self.paths.task_workspace_dir(&self.project, run_id.as_str(), id);
        self.emit(
            run_id,
            Some(id),
            Some(attempt),
            Event::WorkspacePrepareStart { path: expected_dir.display().to_string() },
        );
        let (workspace, prep) = workspaces
            .prepare_task_workspace(
                &self.project,
                run_id.as_str(),
                id,
                &self.repo,
                &self.config.main_branch,
                &branch,
                attempt > 1,
            )
            .await?;
        if prep.recovered {
            self.emit(
                run_id,
                Some(id),
                Some(attempt),
                Event::WorkspacePrepareRecovered { path: workspace.display().to_string() },
            );
        }
        self.emit(
            run_id,
            Some(id),
            Some(attempt),
            Event::WorkspacePrepareComplete { created: prep.created, recovered: prep.recovered },
        );
        {
            let mut s = state.lock();
            if let Some(task) = s.task_mut(id) {
                task.workspace = Some(workspace.clone());
                task.logs_dir = Some(self.paths.task_logs_dir(
                    &self.project,
                    run_id.as_str(),
                    id,
                    &manifest.name,
                ));
            }
            s.heartbeat(id, &self.clock);
        }
        self.checkpoint(store, state)?;

        // Worker phase.
        let request = WorkerRequest {
            project: self.project.clone(),
            run_id: run_id.to_string(),
            task_id: id.to_string(),
            task_name: manifest.name.clone(),
            attempt,
            workspace: workspace.clone(),
            branch: branch.clone(),
            inputs: HashMap::from([
                ("TASK_ID".to_string(), manifest.id.clone()),
                ("TASK_NAME".to_string(), manifest.name.clone()),
                ("TASK_DESCRIPTION".to_string(), manifest.description.clone()),
            ]),
            cancel: self.cancel.clone(),
        };

        let outcome = match self.config.timeout_minutes {
            Some(minutes) => {
                let limit = Duration::from_secs(minutes * 60);
                tokio::time::timeout(limit, self.worker.run(&request)).await.map_err(|_| {
                    EngineError::Timeout { what: format!("task {id} worker"), seconds: limit.as_secs() }
                })??
            }
            None => self.worker.run(&request).await?,
        };

        {
            let mut s = state.lock();
            s.record_usage(id, outcome.usage, &self.clock);
            s.heartbeat(id, &self.clock);
            if let Some(task) = s.task_mut(id) {
                task.container_id.clone_from(&outcome.container_id);
            }
        }
        self.checkpoint(store, state)?;

        self.settle_worker_outcome(run_id, store, state, id, outcome)?;

        // Gates apply only when the worker validated.
        if state.lock().task(id).map(|t| t.status) == Some(TaskStatus::Validated) {
            self.gate_task(run_id, store, state, flow, &manifest, &workspace, attempt).await?;
        }
        Ok(())
    }

    /// Map a finished worker attempt onto the task state machine.
    fn settle_worker_outcome(
        &self,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        id: &str,
        outcome: WorkerOutcome,
    ) -> Result<(), EngineError> {
        if outcome.success {
            state.lock().transition_task(id, TaskStatus::Validated, &self.clock)?;
            self.checkpoint(store, state)?;
            return Ok(());
        }

        let attempts = state.lock().task(id).map(|t| t.attempts).unwrap_or(0);
        let retryable = should_reset_to_pending(
            outcome.success,
            outcome.reset_to_pending,
            self.config.retry.policy,
        ) && attempts < self.config.retry.max_attempts;

        if retryable {
            tracing::info!(task = %id, attempts, "worker failed; resetting to pending");
            state.lock().transition_task(id, TaskStatus::Pending, &self.clock)?;
        } else {
            let error = outcome.error.unwrap_or_else(|| "worker failed".to_string());
            self.emit(
                run_id,
                Some(id),
                Some(attempts),
                Event::TaskFailed { code: "TASK_ERROR".into(), error },
            );
            state.lock().transition_task(id, TaskStatus::Failed, &self.clock)?;
        }
        self.checkpoint(store, state)?;
        Ok(())
    }

    /// Compliance, policy decision, doctor, and validators for a task that
    /// produced a branch.
    #[allow(clippy::too_many_arguments)]
    async fn gate_task(
        self: &Arc<Self>,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        flow: &Arc<TaskFlow>,
        manifest: &TaskManifest,
        workspace: &std::path::Path,
        attempt: u32,
    ) -> Result<(), EngineError> {
        let id = manifest.id.as_str();
        let base_sha = state.lock().base_sha.clone();
        let changed = self.vcs.list_changed_files(workspace, &base_sha).await?;

        // Policy decision (blast radius + surface + checkset).
        let doctor_command = self.policy_decision(run_id, id, attempt, manifest, &changed);

        // Manifest compliance.
        let violations = match &self.model {
            Some(model) => {
                compliance::check_compliance(manifest, &changed, &model.ownership())
            }
            // Without a model there is no ownership; fall back to the
            // declared-files check only.
            None => {
                let empty = myc_policy::OwnershipIndex::build(&[]);
                compliance::check_compliance(manifest, &changed, &empty)
                    .into_iter()
                    .map(|mut v| {
                        v.reasons.retain(|r| {
                            *r == crate::compliance::ViolationReason::FileNotDeclaredForWrite
                        });
                        v
                    })
                    .filter(|v| !v.reasons.is_empty())
                    .collect()
            }
        };

        match compliance::apply_enforcement(self.config.manifest_enforcement, violations) {
            ComplianceOutcome::Clean => {}
            ComplianceOutcome::Warned(violations) => {
                self.emit(
                    run_id,
                    Some(id),
                    Some(attempt),
                    Event::ManifestComplianceWarn {
                        violations: serde_json::to_value(&violations).unwrap_or_default(),
                    },
                );
            }
            ComplianceOutcome::Blocked { violations, rescope } => {
                self.emit(
                    run_id,
                    Some(id),
                    Some(attempt),
                    Event::ManifestComplianceBlock {
                        violations: serde_json::to_value(&violations).unwrap_or_default(),
                    },
                );
                state.lock().transition_task(id, TaskStatus::NeedsRescope, &self.clock)?;
                self.checkpoint(store, state)?;

                let first_rescope = flow.rescoped.lock().insert(id.to_string());
                match rescope {
                    Some(plan) if first_rescope => {
                        let widened = manifest.rescoped(&plan.resources, &plan.files);
                        flow.manifests.lock().insert(id.to_string(), widened);
                        state.lock().transition_task(id, TaskStatus::Pending, &self.clock)?;
                    }
                    _ => {
                        let reason = if first_rescope {
                            "violations include unmapped resources".to_string()
                        } else {
                            "task already rescoped once".to_string()
                        };
                        self.emit(
                            run_id,
                            Some(id),
                            Some(attempt),
                            Event::TaskRescopeFailed { reason: reason.clone() },
                        );
                        let mut s = state.lock();
                        s.transition_task(id, TaskStatus::NeedsHumanReview, &self.clock)?;
                        if let Some(task) = s.task_mut(id) {
                            task.human_review = Some(reason);
                        }
                    }
                }
                self.checkpoint(store, state)?;
                return Ok(());
            }
        }

        // Doctor gate.
        let doctor = DoctorRunner::new(
            self.config.doctor.clone(),
            self.paths.clone(),
            self.project.clone(),
            run_id.clone(),
            Arc::clone(&self.sink),
            self.clock.clone(),
        );
        let doctor_result =
            doctor.run(id, &manifest.name, attempt, workspace, &doctor_command).await;
        let doctor_block = doctor_result.clone().into_block();
        if let Some(task) = state.lock().task_mut(id) {
            task.validator_results.push(doctor_result);
        }

        // LLM validators.
        let pipeline = ValidatorPipeline::new(
            self.config.validators.clone(),
            Arc::clone(&self.validator_runner),
            self.paths.clone(),
            self.project.clone(),
            run_id.clone(),
            Arc::clone(&self.sink),
            self.clock.clone(),
        );
        let request = ValidatorRequest {
            task_id: id.to_string(),
            workspace: workspace.to_path_buf(),
            changed_files: changed,
        };
        let results = pipeline.run_for_task(&manifest.name, attempt, &request).await;
        let validator_block = results.iter().find(|r| r.blocks()).cloned();
        if let Some(task) = state.lock().task_mut(id) {
            task.validator_results.extend(results);
        }

        if let Some(block) = doctor_block.or_else(|| validator_block.and_then(|r| r.into_block()))
        {
            let mut s = state.lock();
            s.transition_task(id, TaskStatus::NeedsHumanReview, &self.clock)?;
            if let Some(task) = s.task_mut(id) {
                task.human_review = Some(format!("{}: {}", block.validator, block.reason));
            }
        }
        self.checkpoint(store, state)?;
        Ok(())
    }

    /// Blast radius + surface + checkset. Returns the doctor command to
    /// run for this task.
    fn policy_decision(
        &self,
        run_id: &RunId,
        id: &str,
        attempt: u32,
        manifest: &TaskManifest,
        changed: &[String],
    ) -> String {
        let Some(model) = &self.model else {
            return manifest.verify.doctor.clone();
        };

        let blast = BlastRadius::compute(model, changed);
        let surface = SurfaceDetector::default().detect(changed);
        let global_doctor = if self.config.doctor.command.is_empty() {
            manifest.verify.doctor.clone()
        } else {
            self.config.doctor.command.clone()
        };
        let decision = PolicyDecision::select(&ChecksetInput {
            touched: &blast.touched_components,
            impacted: &blast.impacted_components,
            commands: &self.config.checkset.commands,
            max_components_for_scoped: self.config.checkset.max_components_for_scoped,
            surface: &surface,
            global_doctor: &global_doctor,
        });
        self.emit(
            run_id,
            Some(id),
            Some(attempt),
            Event::TaskPolicyDecision {
                decision: serde_json::to_value(&decision).unwrap_or_default(),
            },
        );
        decision.checkset.selected_command
    }

    /// Octopus-merge every validated task into a temp branch, then
    /// fast-forward main only when the whole group merged cleanly.
    async fn merge_validated(
        self: &Arc<Self>,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
        flow: &Arc<TaskFlow>,
        batch: Option<&Batch>,
    ) -> Result<(), EngineError> {
        let mut validated: Vec<(String, String, PathBuf)> = state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Validated)
            .filter_map(|t| {
                Some((t.id.to_string(), t.branch.clone()?, t.workspace.clone()?))
            })
            .collect();
        if validated.is_empty() {
            return Ok(());
        }
        // Merge order matches sorted task-id order for determinism.
        validated.sort_by(|a, b| crate::scheduler::natural_cmp(&a.0, &b.0));

        let batch_id = batch
            .map(|b| b.batch_id.to_string())
            .unwrap_or_else(|| format!("bat-resume-{run_id}"));
        let request = MergeRequest {
            repo: self.repo.clone(),
            main_branch: self.config.main_branch.clone(),
            branches: validated
                .iter()
                .map(|(_, branch, workspace)| TaskBranch {
                    branch: branch.clone(),
                    workspace: workspace.clone(),
                })
                .collect(),
            temp_branch: format!("mycelium/tmp-{run_id}"),
        };

        let outcome = self.vcs.merge_task_branches_to_temp(&request).await?;

        if outcome.is_clean() {
            let merge_commit =
                self.vcs.fast_forward(&self.repo, &self.config.main_branch, &request.temp_branch).await?;
            let _ = self.vcs.delete_branch(&self.repo, &request.temp_branch).await;

            {
                let mut s = state.lock();
                for (task_id, _, _) in &validated {
                    s.transition_task(task_id, TaskStatus::Complete, &self.clock)?;
                }
                if let Some(batch) = batch {
                    if let Some(record) =
                        s.batches.iter_mut().find(|b| b.batch_id == batch.batch_id)
                    {
                        record.status = BatchStatus::Merged;
                    }
                }
            }

            let ledger_path = self.paths.ledger_path();
            let manifests = flow.manifests.lock().clone();
            for (task_id, _, _) in &validated {
                self.emit(
                    run_id,
                    Some(task_id.as_str()),
                    None,
                    Event::TaskComplete { merge_commit: Some(merge_commit.clone()) },
                );
                if let Some(manifest) = manifests.get(task_id) {
                    Ledger::record_completed(
                        &ledger_path,
                        task_id,
                        &manifest.canonical_json(),
                        &merge_commit,
                        true,
                        run_id.as_str(),
                        &self.clock,
                    )?;
                }
            }
            self.emit(
                run_id,
                None,
                None,
                Event::BatchComplete { batch_id, merge_commit: Some(merge_commit) },
            );
        } else {
            // Main stays untouched: drop the temp branch and park every
            // member for review.
            let _ = self.vcs.checkout(&self.repo, &self.config.main_branch).await;
            let _ = self.vcs.delete_branch(&self.repo, &request.temp_branch).await;

            self.emit(
                run_id,
                None,
                None,
                Event::BatchMergeConflict { batch_id, conflicts: outcome.conflicts.clone() },
            );
            let mut s = state.lock();
            for (task_id, branch, _) in &validated {
                s.transition_task(task_id, TaskStatus::NeedsHumanReview, &self.clock)?;
                if let Some(task) = s.task_mut(task_id) {
                    task.human_review = Some(if outcome.conflicts.contains(branch) {
                        "merge conflict".to_string()
                    } else {
                        "batch merge aborted by a sibling conflict".to_string()
                    });
                }
            }
            if let Some(batch) = batch {
                if let Some(record) =
                    s.batches.iter_mut().find(|b| b.batch_id == batch.batch_id)
                {
                    record.status = BatchStatus::Failed;
                }
            }
        }
        self.checkpoint(store, state)?;
        Ok(())
    }

    /// Token budgets: in block mode, any task over the cap fails the run.
    fn enforce_budgets(&self, run_id: &RunId, state: &Arc<Mutex<RunState>>) -> bool {
        if self.config.budgets.mode != BudgetMode::Block {
            return false;
        }
        let max = self.config.budgets.max_tokens_per_task;
        let over: Vec<(String, u64)> = state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.tokens_used > max)
            .map(|t| (t.id.to_string(), t.tokens_used))
            .collect();
        for (task_id, tokens_used) in &over {
            self.emit(
                run_id,
                Some(task_id.as_str()),
                None,
                Event::BudgetBlock { tokens_used: *tokens_used, max_tokens_per_task: max },
            );
        }
        !over.is_empty()
    }

    /// Stop signal: leave or kill containers per config, park the run.
    async fn stop(
        &self,
        run_id: &RunId,
        store: &StateStore,
        state: &Arc<Mutex<RunState>>,
    ) -> Result<StoppedResult, EngineError> {
        let requested = self.config.docker.stop_containers_on_exit;
        if requested {
            self.worker.stop_all().await?;
        }
        let containers = if requested { "stopped" } else { "left_running" };

        {
            let mut s = state.lock();
            if s.status == RunStatus::Running {
                s.set_status(RunStatus::Paused, &self.clock)?;
            }
        }
        self.checkpoint(store, state)?;

        self.emit(
            run_id,
            None,
            None,
            Event::RunStop {
                signal: "stop".into(),
                containers: containers.into(),
                stop_containers_requested: requested,
            },
        );
        let _ = std::fs::remove_file(self.paths.stop_file(&self.project, run_id.as_str()));
        Ok(StoppedResult {
            signal: "stop".into(),
            containers: containers.into(),
            stop_containers_requested: requested,
        })
    }

    /// Per-batch run summary for the UI.
    fn write_summary(&self, state: &Arc<Mutex<RunState>>) {
        let s = state.lock();
        let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
        for task in &s.tasks {
            *counts.entry(task.status.to_string()).or_default() += 1;
        }
        let summary = serde_json::json!({
            "run_id": s.run_id,
            "status": s.status.to_string(),
            "tasks": counts,
            "tokens_used": s.tokens_used,
            "estimated_cost": s.estimated_cost,
            "updated_at": s.updated_at,
        });
        let path = self.paths.run_summary(&self.project, s.run_id.as_str());
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_vec_pretty(&summary) {
            let _ = std::fs::write(path, json);
        }
    }
}

impl TaskFlow {
    fn task_name(&self, id: &str) -> String {
        self.manifests.lock().get(id).map(|m| m.name.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
