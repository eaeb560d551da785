// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `myc init`: scaffold config, worker image template, and tasks tree.

use super::Ctx;
use crate::render::CliError;
use myc_storage::ProjectConfig;

const WORKER_DOCKERFILE: &str = "\
FROM node:22-slim
RUN apt-get update && apt-get install -y --no-install-recommends git ca-certificates \\
    && rm -rf /var/lib/apt/lists/*
WORKDIR /workspace
CMD [\"node\", \"/opt/mycelium/worker.js\"]
";

pub fn run(ctx: &Ctx, force: bool) -> Result<serde_json::Value, CliError> {
    let config_path = ctx.paths.project_config(&ctx.project);
    if config_path.exists() && !force {
        return Err(CliError::new(
            "CONFIG_ERROR",
            format!("{} already exists", config_path.display()),
        )
        .with_hint("Pass --force to overwrite."));
    }

    let mut created = Vec::new();
    let write = |path: &std::path::Path, contents: &str| -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::new("CONFIG_ERROR", format!("creating {}: {e}", parent.display())))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| CliError::new("CONFIG_ERROR", format!("writing {}: {e}", path.display())))
    };

    write(&config_path, &ProjectConfig::scaffold_yaml())?;
    created.push(config_path.display().to_string());

    let dockerfile = ctx.repo.join(".mycelium/worker/Dockerfile");
    if !dockerfile.exists() || force {
        write(&dockerfile, WORKER_DOCKERFILE)?;
        created.push(dockerfile.display().to_string());
    }

    let config = ProjectConfig::default();
    for bucket in ["backlog", "active", "archive"] {
        let dir = ctx.repo.join(&config.tasks_dir).join(bucket);
        std::fs::create_dir_all(&dir)
            .map_err(|e| CliError::new("CONFIG_ERROR", format!("creating {}: {e}", dir.display())))?;
    }

    ctx.say(format!("initialized mycelium project `{}`", ctx.project));
    for path in &created {
        ctx.say(format!("  wrote {path}"));
    }
    Ok(serde_json::json!({ "project": ctx.project, "created": created }))
}
