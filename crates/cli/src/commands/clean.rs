// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `myc clean`: remove a run's on-disk footprint.
//!
//! Every deletion target is containment-checked against the orchestrator
//! home before removal.

use super::Ctx;
use crate::render::CliError;
use clap::Args;
use myc_core::RunStatus;
use myc_engine::DockerCli;
use myc_storage::{path_is_within, StateStore};
use std::path::PathBuf;

#[derive(Args)]
pub struct CleanArgs {
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long)]
    pub keep_logs: bool,

    /// Leave containers alone.
    #[arg(long)]
    pub no_containers: bool,

    /// Clean even when the run state says it is still running.
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(ctx: &Ctx, args: CleanArgs) -> Result<serde_json::Value, CliError> {
    let store = StateStore::new(ctx.paths.clone(), &ctx.project);
    let run_id = match args.run_id.clone() {
        Some(id) => id,
        None => store
            .latest_run_id()
            .map_err(|e| CliError::from_diagnostic(&e))?
            .ok_or_else(|| CliError::new("STATE_ERROR", "no runs to clean"))?,
    };

    if let Ok(state) = store.load(&run_id) {
        if state.status == RunStatus::Running && !args.force {
            return Err(CliError::new(
                "STATE_ERROR",
                format!("run {run_id} is still marked running"),
            )
            .with_hint("Stop it first, or pass --force."));
        }
    }

    let mut targets: Vec<PathBuf> = vec![
        ctx.paths.run_workspace_dir(&ctx.project, &run_id),
        store.state_file(&run_id),
        ctx.paths.stop_file(&ctx.project, &run_id),
        ctx.paths.state_dir(&ctx.project).join(format!("{run_id}.lock")),
    ];
    if !args.keep_logs {
        targets.push(ctx.paths.run_logs_dir(&ctx.project, &run_id));
    }

    let home = ctx.paths.home().to_path_buf();
    let mut removed = Vec::new();
    for target in targets {
        if !path_is_within(&home, &target) {
            return Err(CliError::new(
                "STATE_ERROR",
                format!("refusing to remove {} (outside {})", target.display(), home.display()),
            ));
        }
        if !target.exists() {
            continue;
        }
        if args.dry_run {
            ctx.say(format!("would remove {}", target.display()));
        } else {
            let result = if target.is_dir() {
                std::fs::remove_dir_all(&target)
            } else {
                std::fs::remove_file(&target)
            };
            result.map_err(|e| {
                CliError::new("STATE_ERROR", format!("removing {}: {e}", target.display()))
            })?;
            ctx.say(format!("removed {}", target.display()));
        }
        removed.push(target.display().to_string());
    }

    let mut containers = Vec::new();
    if !args.no_containers {
        let docker = DockerCli;
        if let Ok(list) = docker.list_by_labels(&ctx.project, &run_id, None).await {
            for (id, _) in list {
                if args.dry_run {
                    ctx.say(format!("would remove container {id}"));
                } else if docker.remove(&id).await.is_ok() {
                    ctx.say(format!("removed container {id}"));
                }
                containers.push(id);
            }
        }
    }

    Ok(serde_json::json!({
        "run_id": run_id,
        "removed": removed,
        "containers": containers,
        "dry_run": args.dry_run,
    }))
}
