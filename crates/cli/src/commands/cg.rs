// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `myc cg` (alias `cp`): control-plane inspection.

use super::Ctx;
use crate::render::CliError;
use clap::{Args, Subcommand};
use myc_core::SystemClock;
use myc_policy::{
    resolve_base_sha, BlastRadius, ChecksetInput, ControlPlaneModel, ModelStore, PolicyDecision,
    SurfaceDetector, SymbolsService,
};
use myc_vcs::{GitCli, Vcs};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Clone)]
pub struct AtArgs {
    /// Commit the model is keyed by (default: HEAD of the repo).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Subcommand)]
pub enum CgCommand {
    /// Import a pre-extracted model into the cache.
    Build {
        #[command(flatten)]
        at: AtArgs,
        /// Model JSON produced by the extraction passes.
        #[arg(long)]
        from: PathBuf,
    },
    /// Substring search over cached symbols.
    Search {
        #[command(flatten)]
        at: AtArgs,
        query: String,
    },
    /// Forward dependency edges of a component.
    Deps {
        #[command(flatten)]
        at: AtArgs,
        component: String,
    },
    /// Reverse dependency edges of a component.
    Rdeps {
        #[command(flatten)]
        at: AtArgs,
        component: String,
    },
    /// Blast radius for a changed-file set.
    Blast {
        #[command(flatten)]
        at: AtArgs,
        #[arg(long = "files", num_args = 0..)]
        files: Vec<String>,
    },
    /// Checkset selection for a changed-file set.
    #[command(name = "policy")]
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Symbol queries.
    #[command(subcommand)]
    Symbols(SymbolsCommand),
}

#[derive(Subcommand)]
pub enum PolicyCommand {
    Eval {
        #[command(flatten)]
        at: AtArgs,
        #[arg(long = "files", num_args = 0..)]
        files: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SymbolsCommand {
    Find {
        #[command(flatten)]
        at: AtArgs,
        query: String,
    },
    Def {
        #[command(flatten)]
        at: AtArgs,
        name: String,
    },
    Refs {
        #[command(flatten)]
        at: AtArgs,
        name: String,
    },
}

async fn sha_for(ctx: &Ctx, at: &AtArgs) -> Result<String, CliError> {
    let head = GitCli.head_sha(&ctx.repo, "HEAD").await.ok();
    resolve_base_sha(at.at.as_deref(), None, None, head.as_deref())
        .map_err(|e| CliError::from_diagnostic(&e))
}

fn load_model(ctx: &Ctx, sha: &str) -> Result<ControlPlaneModel, CliError> {
    ModelStore::new(ctx.paths.models_base())
        .load(sha)
        .map_err(|e| CliError::from_diagnostic(&e))
}

fn show(ctx: &Ctx, value: &serde_json::Value) {
    ctx.say(serde_json::to_string_pretty(value).unwrap_or_default());
}

pub async fn run(ctx: &Ctx, command: CgCommand) -> Result<serde_json::Value, CliError> {
    match command {
        CgCommand::Build { at, from } => {
            let sha = sha_for(ctx, &at).await?;
            let json = std::fs::read_to_string(&from).map_err(|e| {
                CliError::new("MODEL_STORE_ERROR", format!("reading {}: {e}", from.display()))
            })?;
            let model: ControlPlaneModel = serde_json::from_str(&json).map_err(|e| {
                CliError::new("MODEL_STORE_ERROR", format!("parsing {}: {e}", from.display()))
            })?;
            ModelStore::new(ctx.paths.models_base())
                .import(&sha, &model, BTreeMap::new(), &SystemClock)
                .map_err(|e| CliError::from_diagnostic(&e))?;
            let result = serde_json::json!({
                "sha": sha,
                "components": model.components.len(),
                "symbols": model.symbols.len(),
            });
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Search { at, query } => {
            let sha = sha_for(ctx, &at).await?;
            let model = load_model(ctx, &sha)?;
            let hits = SymbolsService::new(&model).with_snippets(&ctx.repo).find(&query);
            let result = serde_json::json!({ "sha": sha, "hits": hits });
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Deps { at, component } => {
            let sha = sha_for(ctx, &at).await?;
            let model = load_model(ctx, &sha)?;
            let edges: Vec<_> = model
                .deps
                .as_ref()
                .map(|g| {
                    g.edges.iter().filter(|e| e.from_component == component).collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let result = serde_json::json!({ "component": component, "edges": edges });
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Rdeps { at, component } => {
            let sha = sha_for(ctx, &at).await?;
            let model = load_model(ctx, &sha)?;
            let edges: Vec<_> = model
                .deps
                .as_ref()
                .map(|g| {
                    g.edges.iter().filter(|e| e.to_component == component).collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let result = serde_json::json!({ "component": component, "edges": edges });
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Blast { at, files } => {
            let sha = sha_for(ctx, &at).await?;
            let model = load_model(ctx, &sha)?;
            let blast = BlastRadius::compute(&model, &files);
            let result = serde_json::to_value(&blast).unwrap_or_default();
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Policy { command: PolicyCommand::Eval { at, files } } => {
            let sha = sha_for(ctx, &at).await?;
            let model = load_model(ctx, &sha)?;
            let config = ctx.config()?;
            let blast = BlastRadius::compute(&model, &files);
            let surface = SurfaceDetector::default().detect(&files);
            let decision = PolicyDecision::select(&ChecksetInput {
                touched: &blast.touched_components,
                impacted: &blast.impacted_components,
                commands: &config.checkset.commands,
                max_components_for_scoped: config.checkset.max_components_for_scoped,
                surface: &surface,
                global_doctor: &config.doctor.command,
            });
            let result = serde_json::json!({
                "blast": blast,
                "surface": surface,
                "decision": decision,
            });
            show(ctx, &result);
            Ok(result)
        }
        CgCommand::Symbols(symbols) => {
            let (at, result) = match symbols {
                SymbolsCommand::Find { at, query } => {
                    let sha = sha_for(ctx, &at).await?;
                    let model = load_model(ctx, &sha)?;
                    let hits = SymbolsService::new(&model).with_snippets(&ctx.repo).find(&query);
                    (sha, serde_json::json!({ "hits": hits }))
                }
                SymbolsCommand::Def { at, name } => {
                    let sha = sha_for(ctx, &at).await?;
                    let model = load_model(ctx, &sha)?;
                    let hits = SymbolsService::new(&model).with_snippets(&ctx.repo).def(&name);
                    (sha, serde_json::json!({ "hits": hits }))
                }
                SymbolsCommand::Refs { at, name } => {
                    let sha = sha_for(ctx, &at).await?;
                    let model = load_model(ctx, &sha)?;
                    let refs = SymbolsService::new(&model)
                        .refs(&name)
                        .map_err(|e| CliError::from_diagnostic(&e))?;
                    (sha, serde_json::json!({ "refs": refs }))
                }
            };
            let result = serde_json::json!({ "sha": at, "result": result });
            show(ctx, &result);
            Ok(result)
        }
    }
}
