// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkset / doctor-command selection.
//!
//! Given the touched and impacted components plus per-component commands,
//! pick the narrowest verification command set, falling back to the global
//! doctor when scoping is not possible.

use crate::surface::SurfaceChange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const FALLBACK_MISSING_COMMAND: &str = "missing_command_mapping";
pub const FALLBACK_SURFACE_CHANGE: &str = "surface_change";
pub const FALLBACK_TOO_MANY: &str = "too_many_components";

/// The selected verification commands for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkset {
    pub required_components: Vec<String>,
    pub selected_command: String,
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub rationale: Vec<String>,
}

/// Full policy decision emitted as `task.policy.decision`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub touched_components: Vec<String>,
    pub checkset: Checkset,
}

/// Inputs to checkset selection.
pub struct ChecksetInput<'a> {
    pub touched: &'a [String],
    pub impacted: &'a [String],
    pub commands: &'a BTreeMap<String, String>,
    pub max_components_for_scoped: usize,
    pub surface: &'a SurfaceChange,
    pub global_doctor: &'a str,
}

impl PolicyDecision {
    /// Deterministic: identical inputs produce an identical decision.
    pub fn select(input: &ChecksetInput<'_>) -> Self {
        let mut required: BTreeSet<String> = input.touched.iter().cloned().collect();
        let mut rationale: Vec<String> =
            input.touched.iter().map(|c| format!("touched:{c}")).collect();

        if input.surface.is_surface_change {
            for component in input.impacted {
                if required.insert(component.clone()) {
                    rationale.push(format!("impacted:{component}"));
                }
            }
            for category in &input.surface.categories {
                rationale.push(format!("surface_change:{category}"));
            }
        }

        let required: Vec<String> = required.into_iter().collect();

        let fallback_reason = if required.iter().any(|c| !input.commands.contains_key(c)) {
            Some(FALLBACK_MISSING_COMMAND)
        } else if required.is_empty() {
            // Nothing mapped to run scoped; a surface change is the usual
            // cause (e.g. a repo-wide config file with no owning component).
            if input.surface.is_surface_change {
                Some(FALLBACK_SURFACE_CHANGE)
            } else {
                Some(FALLBACK_MISSING_COMMAND)
            }
        } else if required.len() > input.max_components_for_scoped {
            Some(FALLBACK_TOO_MANY)
        } else {
            None
        };

        let checkset = match fallback_reason {
            None => {
                let commands: Vec<&str> = required
                    .iter()
                    .filter_map(|c| input.commands.get(c).map(String::as_str))
                    .collect();
                Checkset {
                    required_components: required,
                    selected_command: commands.join(" && "),
                    is_fallback: false,
                    fallback_reason: None,
                    rationale,
                }
            }
            Some(reason) => {
                rationale.push(format!("fallback:{reason}"));
                Checkset {
                    required_components: required,
                    selected_command: input.global_doctor.to_string(),
                    is_fallback: true,
                    fallback_reason: Some(reason.to_string()),
                    rationale,
                }
            }
        };

        Self { touched_components: input.touched.to_vec(), checkset }
    }
}

#[cfg(test)]
#[path = "checkset_tests.rs"]
mod tests;
