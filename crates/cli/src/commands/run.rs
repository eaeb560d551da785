// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `myc run` / `resume` / `stop`: drive the engine.

use super::Ctx;
use crate::render::CliError;
use clap::Args;
use myc_core::{RunId, SystemClock};
use myc_engine::{
    DockerWorkerRunner, LocalWorker, MockValidatorRunner, RunEngine, RunOptions, RunOutcome,
};
use myc_storage::{FanoutSink, LogSink, ProjectConfig, StateStore};
use myc_tasks::{TaskIndex, TaskManifest};
use myc_vcs::GitCli;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Run workers in-process instead of Docker containers.
    #[arg(long, alias = "local-worker")]
    pub no_docker: bool,

    /// Skip the worker image build.
    #[arg(long)]
    pub no_build_image: bool,

    /// Restrict the run to these task ids.
    #[arg(long = "tasks", num_args = 1..)]
    pub task_ids: Vec<String>,

    /// Skip tasks the ledger already records as completed
    /// (`--reuse-completed=false` re-executes them).
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub reuse_completed: bool,
}

pub async fn start(ctx: &Ctx, args: RunArgs) -> Result<serde_json::Value, CliError> {
    let run_id = RunId::new(args.run_id.clone().unwrap_or_else(|| RunId::generate().0));
    execute(ctx, args, run_id, false).await
}

pub async fn resume(ctx: &Ctx, run_id: Option<String>) -> Result<serde_json::Value, CliError> {
    let store = StateStore::new(ctx.paths.clone(), &ctx.project);
    let run_id = match run_id {
        Some(id) => id,
        None => store
            .latest_run_id()
            .map_err(|e| CliError::from_diagnostic(&e))?
            .ok_or_else(|| {
                CliError::new("STATE_ERROR", format!("no runs recorded for {}", ctx.project))
                    .with_hint("Start one with `myc run`.")
            })?,
    };
    let args = RunArgs {
        run_id: Some(run_id.clone()),
        max_parallel: None,
        no_docker: false,
        no_build_image: true,
        task_ids: vec![],
        reuse_completed: true,
    };
    execute(ctx, args, RunId::new(run_id), true).await
}

pub fn stop(ctx: &Ctx, run_id: &str) -> Result<serde_json::Value, CliError> {
    let stop_file = ctx.paths.stop_file(&ctx.project, run_id);
    if let Some(parent) = stop_file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::new("STATE_ERROR", format!("creating {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(&stop_file, "stop\n").map_err(|e| {
        CliError::new("STATE_ERROR", format!("writing {}: {e}", stop_file.display()))
    })?;
    ctx.say(format!("signalled {run_id}; the engine stops between tasks"));
    Ok(serde_json::json!({ "run_id": run_id, "signalled": true }))
}

async fn execute(
    ctx: &Ctx,
    args: RunArgs,
    run_id: RunId,
    resume: bool,
) -> Result<serde_json::Value, CliError> {
    let config = ctx.config()?;
    let manifests = load_manifests(ctx, &config, &args.task_ids)?;
    if manifests.is_empty() {
        return Err(CliError::new("TASK_ERROR", "no tasks to run")
            .with_hint("Create tasks with `myc plan --input <file>`."));
    }

    let mock_llm = std::env::var("MOCK_LLM").as_deref() == Ok("1");
    let validators_enabled = [
        config.validators.test.mode,
        config.validators.style.mode,
        config.validators.architecture.mode,
    ]
    .iter()
    .any(|m| *m != myc_core::ValidatorMode::Off);
    if validators_enabled && !mock_llm {
        tracing::warn!(
            "LLM validators are enabled but no provider is wired; verdicts come from the mock \
             runner (set MOCK_LLM=1 to silence this warning)"
        );
    }

    let task_names: HashMap<String, String> =
        manifests.iter().map(|m| (m.id.clone(), m.name.clone())).collect();
    let sink: Arc<dyn LogSink> = Arc::new(
        FanoutSink::open(ctx.paths.clone(), &ctx.project, run_id.clone(), task_names)
            .map_err(|e| CliError::new("STATE_ERROR", format!("opening event logs: {e}")))?,
    );

    let clock = SystemClock;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping between tasks");
                cancel.cancel();
            }
        });
    }

    let worker: Arc<dyn myc_engine::WorkerRunner> = if args.no_docker {
        Arc::new(LocalWorker {
            command: std::env::var("MYCELIUM_LOCAL_WORKER_CMD")
                .unwrap_or_else(|_| "true".into()),
        })
    } else {
        Arc::new(DockerWorkerRunner::new(
            config.docker.clone(),
            Arc::clone(&sink),
            run_id.clone(),
            ctx.project.clone(),
            clock.clone(),
            !args.no_build_image,
        ))
    };

    // A cached control-plane model is used when present; runs proceed
    // without one (compliance then checks declared files only).
    let vcs = Arc::new(GitCli);
    let model = match myc_vcs::Vcs::resolve_run_base_sha(&*vcs, &ctx.repo, &config.main_branch)
        .await
    {
        Ok(sha) => myc_policy::ModelStore::new(ctx.paths.models_base()).load(&sha).ok(),
        Err(_) => None,
    };

    let engine = Arc::new(RunEngine {
        paths: ctx.paths.clone(),
        config,
        project: ctx.project.clone(),
        repo: ctx.repo.clone(),
        vcs,
        worker,
        validator_runner: Arc::new(MockValidatorRunner),
        sink,
        clock,
        model,
        cancel,
    });

    let options = RunOptions {
        run_id: run_id.clone(),
        resume,
        max_parallel: args.max_parallel,
        task_ids: args.task_ids.clone(),
        reuse_completed: args.reuse_completed,
    };

    let outcome = engine
        .execute(&options, manifests)
        .await
        .map_err(|e| CliError::from_diagnostic(&e))?;

    let (status, stopped) = match &outcome {
        RunOutcome::Finished(status) => (status.to_string(), serde_json::Value::Null),
        RunOutcome::Stopped(result) => (
            "stopped".to_string(),
            serde_json::json!({
                "signal": result.signal,
                "containers": result.containers,
                "stop_containers_requested": result.stop_containers_requested,
            }),
        ),
    };
    ctx.say(format!("run {run_id}: {status}"));
    Ok(serde_json::json!({ "run_id": run_id, "status": status, "stopped": stopped }))
}

fn load_manifests(
    ctx: &Ctx,
    config: &ProjectConfig,
    task_ids: &[String],
) -> Result<Vec<TaskManifest>, CliError> {
    let tasks_dir = ctx.repo.join(&config.tasks_dir);
    let index = TaskIndex::build(&tasks_dir).map_err(|e| CliError::from_diagnostic(&e))?;
    index.load_manifests(task_ids).map_err(|e| CliError::from_diagnostic(&e))
}
