// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Surface-change detection.
//!
//! A change is a surface change when any changed file matches the glob set
//! of one of four categories: contract, config, migration, or
//! public-entrypoint. Surface changes widen checkset selection to the
//! impacted components.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceCategory {
    Contract,
    Config,
    Migration,
    PublicEntrypoint,
}

impl std::fmt::Display for SurfaceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SurfaceCategory::Contract => "contract",
            SurfaceCategory::Config => "config",
            SurfaceCategory::Migration => "migration",
            SurfaceCategory::PublicEntrypoint => "public-entrypoint",
        })
    }
}

/// Detection result for one changed-file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceChange {
    pub is_surface_change: bool,
    pub categories: Vec<SurfaceCategory>,
    pub matched_files_by_category: BTreeMap<String, Vec<String>>,
}

impl SurfaceChange {
    pub fn none() -> Self {
        Self {
            is_surface_change: false,
            categories: Vec::new(),
            matched_files_by_category: BTreeMap::new(),
        }
    }
}

/// Compiled glob sets per category.
pub struct SurfaceDetector {
    patterns: Vec<(SurfaceCategory, Vec<Pattern>)>,
}

impl SurfaceDetector {
    /// Compile custom pattern sets. Invalid globs are skipped with a
    /// warning rather than failing detection outright.
    pub fn new(sets: &[(SurfaceCategory, Vec<String>)]) -> Self {
        let patterns = sets
            .iter()
            .map(|(category, globs)| {
                let compiled = globs
                    .iter()
                    .filter_map(|g| match Pattern::new(g) {
                        Ok(p) => Some(p),
                        Err(err) => {
                            tracing::warn!(glob = %g, %err, "skipping invalid surface glob");
                            None
                        }
                    })
                    .collect();
                (*category, compiled)
            })
            .collect();
        Self { patterns }
    }

    pub fn detect(&self, changed_files: &[String]) -> SurfaceChange {
        let mut matched: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut categories: Vec<SurfaceCategory> = Vec::new();

        for (category, globs) in &self.patterns {
            let hits: Vec<String> = changed_files
                .iter()
                .filter(|file| globs.iter().any(|g| g.matches(file)))
                .cloned()
                .collect();
            if !hits.is_empty() {
                categories.push(*category);
                matched.insert(category.to_string(), hits);
            }
        }

        categories.sort();
        SurfaceChange {
            is_surface_change: !categories.is_empty(),
            categories,
            matched_files_by_category: matched,
        }
    }
}

impl Default for SurfaceDetector {
    fn default() -> Self {
        let sets = vec![
            (
                SurfaceCategory::Contract,
                vec![
                    "**/*.proto".to_string(),
                    "**/openapi*.yaml".to_string(),
                    "**/openapi*.yml".to_string(),
                    "**/openapi*.json".to_string(),
                    "**/*.graphql".to_string(),
                    "**/contracts/**".to_string(),
                ],
            ),
            (
                SurfaceCategory::Config,
                vec![
                    "**/config/**".to_string(),
                    "**/*.config.*".to_string(),
                    "**/.env*".to_string(),
                ],
            ),
            (SurfaceCategory::Migration, vec!["**/migrations/**".to_string()]),
            (
                SurfaceCategory::PublicEntrypoint,
                vec![
                    "**/main.*".to_string(),
                    "**/index.*".to_string(),
                    "**/bin/**".to_string(),
                ],
            ),
        ];
        Self::new(&sets)
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
