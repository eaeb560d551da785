// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! myc-policy: the control plane.
//!
//! A commit-keyed cache of the extracted code-graph model, plus the pure
//! decisions layered on top of it: blast radius, surface-change detection,
//! and checkset selection. Extraction itself is an external collaborator
//! behind the [`ModelExtractor`] seam.

pub mod blast;
pub mod checkset;
pub mod error;
pub mod model;
pub mod store;
pub mod surface;
pub mod symbols;

pub use blast::BlastRadius;
pub use checkset::{Checkset, ChecksetInput, PolicyDecision};
pub use error::PolicyError;
pub use model::{
    Component, Confidence, ControlPlaneModel, DepEdge, DepGraph, OwnershipIndex, SCHEMA_VERSION,
};
pub use store::{resolve_base_sha, ModelExtractor, ModelMetadata, ModelStore};
pub use surface::{SurfaceCategory, SurfaceChange, SurfaceDetector};
pub use symbols::{SymbolEntry, SymbolHit, SymbolRef, SymbolsService};
