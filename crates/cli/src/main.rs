// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `myc`: the Mycelium orchestrator CLI.

mod commands;
mod render;

use clap::{Parser, Subcommand};
use commands::Ctx;
use render::CliError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "myc", version, about = "Mycelium workload orchestrator")]
struct Cli {
    /// Emit one JSON envelope line on stdout instead of human output.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose error rendering (code, causes).
    #[arg(long, global = true)]
    debug: bool,

    /// Repository to operate on (default: current directory).
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Project name (default: repository directory name).
    #[arg(long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold `.mycelium/` for this repository.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Emit task directories from a plan file.
    Plan {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Start a run.
    Run(commands::run::RunArgs),
    /// Resume the latest (or a specific) run.
    Resume {
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Signal a running engine to stop.
    Stop {
        #[arg(long)]
        run_id: String,
    },
    /// Remove a run's workspaces, logs, and state.
    Clean(commands::clean::CleanArgs),
    /// Control-plane inspection.
    #[command(subcommand)]
    Cg(commands::cg::CgCommand),
    /// Alias of `cg`.
    #[command(subcommand)]
    Cp(commands::cg::CgCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MYC_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let repo = cli
        .repo
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let project = cli.project.clone().unwrap_or_else(|| {
        repo.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "default".into())
    });
    let ctx = Ctx {
        paths: myc_storage::PathsContext::resolve(&repo),
        repo,
        project,
        json: cli.json,
        debug: cli.debug,
    };

    let result: Result<serde_json::Value, CliError> = match cli.command {
        Command::Init { force } => commands::init::run(&ctx, force),
        Command::Plan { input, dry_run } => commands::plan::run(&ctx, &input, dry_run),
        Command::Run(args) => commands::run::start(&ctx, args).await,
        Command::Resume { run_id } => commands::run::resume(&ctx, run_id).await,
        Command::Stop { run_id } => commands::run::stop(&ctx, &run_id),
        Command::Clean(args) => commands::clean::run(&ctx, args).await,
        Command::Cg(command) | Command::Cp(command) => commands::cg::run(&ctx, command).await,
    };

    // Every --json command emits exactly one line; exit 0 iff ok.
    match result {
        Ok(value) => {
            if ctx.json {
                println!("{}", render::ok_envelope(value));
            }
        }
        Err(error) => {
            if ctx.json {
                println!("{}", error.envelope());
            } else {
                eprintln!("{}", error.render(ctx.debug));
            }
            std::process::exit(1);
        }
    }
}
