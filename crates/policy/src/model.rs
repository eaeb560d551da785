// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cached code-graph model: components, ownership, dependency edges.

use crate::symbols::{SymbolEntry, SymbolRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the serialized model shape changes; a cached model with
/// another version is rebuilt, never migrated.
pub const SCHEMA_VERSION: u32 = 2;

/// A named unit of the repository owning a set of root paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Forward-slashed paths relative to the repo root, e.g. `apps/a`.
    pub roots: Vec<String>,
}

/// Edge confidence; closure traversal only follows `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// A dependency edge: `from_component` depends on `to_component`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepEdge {
    pub from_component: String,
    pub to_component: String,
    pub kind: String,
    pub confidence: Confidence,
}

/// The dependency graph. May legitimately contain cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepGraph {
    pub edges: Vec<DepEdge>,
}

impl DepGraph {
    /// Deduplicate by `(from, to, kind)`, keeping the first occurrence.
    pub fn deduped(mut self) -> Self {
        let mut seen = std::collections::BTreeSet::new();
        self.edges.retain(|e| {
            seen.insert((e.from_component.clone(), e.to_component.clone(), e.kind.clone()))
        });
        self
    }

    /// Reverse adjacency: `to_component` → edges pointing at it. Walking
    /// this from a component yields its dependents.
    pub fn reverse_index(&self) -> BTreeMap<&str, Vec<&DepEdge>> {
        let mut index: BTreeMap<&str, Vec<&DepEdge>> = BTreeMap::new();
        for edge in &self.edges {
            index.entry(edge.to_component.as_str()).or_default().push(edge);
        }
        index
    }
}

/// Longest-root file ownership over the component set.
#[derive(Debug, Clone)]
pub struct OwnershipIndex {
    /// (root, component), sorted by root length descending.
    roots: Vec<(String, String)>,
}

impl OwnershipIndex {
    pub fn build(components: &[Component]) -> Self {
        let mut roots: Vec<(String, String)> = components
            .iter()
            .flat_map(|c| {
                c.roots.iter().map(move |r| (r.trim_matches('/').to_string(), c.name.clone()))
            })
            .collect();
        roots.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { roots }
    }

    /// The owning component of a repo-relative path, by longest root.
    pub fn owner_of(&self, path: &str) -> Option<&str> {
        let path = path.trim_matches('/');
        self.roots
            .iter()
            .find(|(root, _)| {
                path == root || path.strip_prefix(root.as_str()).is_some_and(|r| r.starts_with('/'))
            })
            .map(|(_, component)| component.as_str())
    }
}

/// The full cached model for one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneModel {
    pub schema_version: u32,
    pub components: Vec<Component>,
    /// Missing graph downgrades blast confidence to medium.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<DepGraph>,
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
    /// Reference tables are optional; `refs` queries without them error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_refs: Option<Vec<SymbolRef>>,
}

impl ControlPlaneModel {
    pub fn new(components: Vec<Component>, deps: Option<DepGraph>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            components,
            deps: deps.map(DepGraph::deduped),
            symbols: Vec::new(),
            symbol_refs: None,
        }
    }

    pub fn ownership(&self) -> OwnershipIndex {
        OwnershipIndex::build(&self.components)
    }

    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
