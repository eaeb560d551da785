// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations.

pub mod cg;
pub mod clean;
pub mod init;
pub mod plan;
pub mod run;

use myc_storage::PathsContext;
use std::path::PathBuf;

/// Shared invocation context; environment is read once in `main`.
pub struct Ctx {
    pub repo: PathBuf,
    pub project: String,
    pub paths: PathsContext,
    pub json: bool,
    pub debug: bool,
}

impl Ctx {
    /// Load the project config, defaulting when no file exists yet.
    pub fn config(&self) -> Result<myc_storage::ProjectConfig, crate::render::CliError> {
        let path = self.paths.project_config(&self.project);
        if path.is_file() {
            myc_storage::ProjectConfig::load(&path)
                .map_err(|e| crate::render::CliError::from_diagnostic(&e))
        } else {
            tracing::warn!(path = %path.display(), "no project config; using defaults");
            Ok(myc_storage::ProjectConfig::default())
        }
    }

    /// Print human-facing output unless `--json` owns stdout.
    pub fn say(&self, text: impl AsRef<str>) {
        if !self.json {
            println!("{}", text.as_ref());
        }
    }
}
