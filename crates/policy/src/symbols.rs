// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbol queries over the cached tables.

use crate::error::PolicyError;
use crate::model::ControlPlaneModel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A symbol definition from the cached table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// A reference site; only present when the model carries reference tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    pub file: String,
    pub line: u32,
}

/// A query hit, optionally enriched with a source snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolHit {
    pub name: String,
    pub kind: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// find/def/refs over one model, with optional live-tree snippet loading.
pub struct SymbolsService<'a> {
    model: &'a ControlPlaneModel,
    repo_root: Option<&'a Path>,
}

impl<'a> SymbolsService<'a> {
    pub fn new(model: &'a ControlPlaneModel) -> Self {
        Self { model, repo_root: None }
    }

    /// Enable snippet loading from the live file tree.
    pub fn with_snippets(mut self, repo_root: &'a Path) -> Self {
        self.repo_root = Some(repo_root);
        self
    }

    /// Case-insensitive substring search over symbol names.
    pub fn find(&self, query: &str) -> Vec<SymbolHit> {
        let needle = query.to_lowercase();
        self.model
            .symbols
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .map(|s| self.hit(s))
            .collect()
    }

    /// Exact-name definitions.
    pub fn def(&self, name: &str) -> Vec<SymbolHit> {
        self.model.symbols.iter().filter(|s| s.name == name).map(|s| self.hit(s)).collect()
    }

    /// Reference sites; errors when the model has no reference tables.
    pub fn refs(&self, name: &str) -> Result<Vec<SymbolRef>, PolicyError> {
        let refs = self.model.symbol_refs.as_ref().ok_or(PolicyError::SymbolRefsUnavailable)?;
        Ok(refs.iter().filter(|r| r.name == name).cloned().collect())
    }

    fn hit(&self, entry: &SymbolEntry) -> SymbolHit {
        SymbolHit {
            name: entry.name.clone(),
            kind: entry.kind.clone(),
            file: entry.file.clone(),
            line: entry.line,
            component: entry.component.clone(),
            snippet: self.repo_root.and_then(|root| load_line(root, &entry.file, entry.line)),
        }
    }
}

/// Read one line (1-indexed) from the live tree; absent files yield no
/// snippet rather than an error, since the cache may outlive the checkout.
fn load_line(root: &Path, file: &str, line: u32) -> Option<String> {
    let text = std::fs::read_to_string(root.join(file)).ok()?;
    text.lines().nth(line.checked_sub(1)? as usize).map(|l| l.trim_end().to_string())
}

#[cfg(test)]
#[path = "symbols_tests.rs"]
mod tests;
