// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blast-radius computation.
//!
//! Maps changed files to components, then closes over *reverse* dependency
//! edges to find everything that could observe the change. The closure is
//! an iterative BFS with a visited set — the dep graph may contain cycles.

use crate::model::{Confidence, ControlPlaneModel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

pub const REASON_UNMAPPED_PATHS: &str = "unmapped_paths";
pub const REASON_MISSING_DEP_GRAPH: &str = "missing_dependency_graph";
pub const REASON_LOW_CONFIDENCE_EDGES: &str = "low_confidence_edges";

/// The components a change touches and could impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastRadius {
    pub touched_components: Vec<String>,
    pub impacted_components: Vec<String>,
    pub confidence: Confidence,
    pub widening_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmapped_paths: Vec<String>,
}

impl BlastRadius {
    /// Compute from a model and a changed-file list.
    pub fn compute(model: &ControlPlaneModel, changed_files: &[String]) -> Self {
        let ownership = model.ownership();

        let mut touched: BTreeSet<String> = BTreeSet::new();
        let mut unmapped: Vec<String> = Vec::new();
        for file in changed_files {
            match ownership.owner_of(file) {
                Some(component) => {
                    touched.insert(component.to_string());
                }
                None => unmapped.push(file.clone()),
            }
        }

        let mut confidence = Confidence::High;
        let mut reasons: Vec<String> = Vec::new();

        if !unmapped.is_empty() {
            confidence = confidence.min(Confidence::Medium);
            reasons.push(REASON_UNMAPPED_PATHS.to_string());
        }

        let mut impacted: BTreeSet<String> = touched.clone();

        match &model.deps {
            None => {
                confidence = confidence.min(Confidence::Medium);
                reasons.push(REASON_MISSING_DEP_GRAPH.to_string());
            }
            Some(graph) => {
                let reverse = graph.reverse_index();
                let mut saw_low_confidence = false;

                let mut queue: VecDeque<String> = touched.iter().cloned().collect();
                let mut visited: BTreeSet<String> = touched.clone();
                while let Some(current) = queue.pop_front() {
                    for edge in reverse.get(current.as_str()).into_iter().flatten() {
                        if edge.confidence != Confidence::High {
                            saw_low_confidence = true;
                            continue;
                        }
                        if visited.insert(edge.from_component.clone()) {
                            impacted.insert(edge.from_component.clone());
                            queue.push_back(edge.from_component.clone());
                        }
                    }
                }

                if saw_low_confidence {
                    confidence = Confidence::Low;
                    reasons.push(REASON_LOW_CONFIDENCE_EDGES.to_string());
                    // Conservative over-approximation: a dubious edge means
                    // anything could be downstream.
                    impacted = model.component_names().into_iter().collect();
                    impacted.extend(touched.iter().cloned());
                }
            }
        }

        Self {
            touched_components: touched.into_iter().collect(),
            impacted_components: impacted.into_iter().collect(),
            confidence,
            widening_reasons: reasons,
            unmapped_paths: unmapped,
        }
    }
}

#[cfg(test)]
#[path = "blast_tests.rs"]
mod tests;
