// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane error taxonomy.

use myc_core::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no control-plane model built for {sha}")]
    ModelNotBuilt { sha: String },

    #[error("model store failure at {path}: {detail}")]
    ModelStore { path: String, detail: String },

    #[error("symbol references are not available in this model")]
    SymbolRefsUnavailable,

    #[error("model extraction failed: {detail}")]
    Extract { detail: String },

    #[error("cannot resolve a base sha (no explicit sha, state, ref, or HEAD)")]
    NoBaseSha,
}

impl Diagnostic for PolicyError {
    fn code(&self) -> &'static str {
        match self {
            PolicyError::ModelNotBuilt { .. } => "MODEL_NOT_BUILT",
            PolicyError::ModelStore { .. } => "MODEL_STORE_ERROR",
            PolicyError::SymbolRefsUnavailable => "SYMBOL_REFS_UNAVAILABLE",
            PolicyError::Extract { .. } | PolicyError::NoBaseSha => "MODEL_STORE_ERROR",
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            PolicyError::ModelNotBuilt { sha } => {
                Some(format!("Run `myc cg build --at {sha}` first."))
            }
            PolicyError::SymbolRefsUnavailable => {
                Some("Rebuild the model with reference extraction enabled.".into())
            }
            _ => None,
        }
    }
}
