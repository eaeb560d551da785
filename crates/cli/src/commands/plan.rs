// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `myc plan`: turn a plan file into task directories.
//!
//! The plan is a JSON document `{ "tasks": [ <manifest>, ... ] }`; each
//! manifest is validated against the strict schema before anything is
//! written.

use super::Ctx;
use crate::render::CliError;
use myc_core::slugify;
use myc_tasks::TaskManifest;
use std::path::Path;

pub fn run(ctx: &Ctx, input: &Path, dry_run: bool) -> Result<serde_json::Value, CliError> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| CliError::new("CONFIG_ERROR", format!("reading {}: {e}", input.display())))?;
    let plan: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CliError::new("CONFIG_ERROR", format!("parsing {}: {e}", input.display())))?;

    let tasks = plan
        .get("tasks")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| {
            CliError::new("CONFIG_ERROR", "plan file must contain a `tasks` array")
        })?;

    let mut manifests = Vec::with_capacity(tasks.len());
    for task in tasks {
        let manifest = TaskManifest::parse(input, &task.to_string())
            .map_err(|e| CliError::from_diagnostic(&e))?;
        manifests.push(manifest);
    }

    let config = ctx.config()?;
    let backlog = ctx.repo.join(&config.tasks_dir).join("backlog");
    let mut written = Vec::new();

    for manifest in &manifests {
        let dir = backlog.join(format!("{}-{}", manifest.id, slugify(&manifest.name, 40)));
        let path = dir.join("manifest.json");
        if dry_run {
            ctx.say(format!("would write {}", path.display()));
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| {
                CliError::new("CONFIG_ERROR", format!("creating {}: {e}", dir.display()))
            })?;
            let json = serde_json::to_string_pretty(manifest).unwrap_or_default();
            std::fs::write(&path, json).map_err(|e| {
                CliError::new("CONFIG_ERROR", format!("writing {}: {e}", path.display()))
            })?;
            ctx.say(format!("wrote {}", path.display()));
        }
        written.push(manifest.id.clone());
    }

    Ok(serde_json::json!({ "tasks": written, "dry_run": dry_run }))
}
