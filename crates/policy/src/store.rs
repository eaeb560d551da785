// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit-keyed model cache.
//!
//! Layout per commit: `control-plane/models/<sha>/{model.json,
//! metadata.json,.lock}`. Builders hold the `.lock` file exclusively;
//! readers never lock because the atomic rename publishes whole files.

use crate::error::PolicyError;
use crate::model::{ControlPlaneModel, SCHEMA_VERSION};
use fs2::FileExt;
use myc_core::Clock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sidecar metadata gating cache reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub schema_version: u32,
    pub extractor_versions: BTreeMap<String, String>,
    pub base_sha: String,
    pub model_hash: String,
    pub created_at: String,
}

/// Extraction seam. The real passes (component discovery, symbol tables,
/// workspace dep edges) live outside the orchestrator core.
pub trait ModelExtractor: Send + Sync {
    /// Version string per extractor pass; any mismatch invalidates cache.
    fn versions(&self) -> BTreeMap<String, String>;

    fn extract(&self, repo: &Path, base_sha: &str) -> Result<ControlPlaneModel, PolicyError>;
}

/// Base-sha resolution precedence: explicit > state > ref-resolved > HEAD.
pub fn resolve_base_sha(
    explicit: Option<&str>,
    state_sha: Option<&str>,
    ref_sha: Option<&str>,
    head_sha: Option<&str>,
) -> Result<String, PolicyError> {
    explicit
        .or(state_sha)
        .or(ref_sha)
        .or(head_sha)
        .map(str::to_string)
        .ok_or(PolicyError::NoBaseSha)
}

/// The on-disk model cache rooted at `control-plane/models/`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    base: PathBuf,
}

impl ModelStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn model_dir(&self, sha: &str) -> PathBuf {
        self.base.join(sha)
    }

    /// Load a cached model, failing with `MODEL_NOT_BUILT` when absent and
    /// `MODEL_STORE_ERROR` when unreadable or incompatible.
    pub fn load(&self, sha: &str) -> Result<ControlPlaneModel, PolicyError> {
        let dir = self.model_dir(sha);
        let model_path = dir.join("model.json");
        if !model_path.is_file() {
            return Err(PolicyError::ModelNotBuilt { sha: sha.to_string() });
        }
        let metadata = self.read_metadata(&dir)?;
        if metadata.schema_version != SCHEMA_VERSION {
            return Err(PolicyError::ModelNotBuilt { sha: sha.to_string() });
        }
        let json = fs::read_to_string(&model_path).map_err(|e| PolicyError::ModelStore {
            path: model_path.display().to_string(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| PolicyError::ModelStore {
            path: model_path.display().to_string(),
            detail: e.to_string(),
        })
    }

    /// Return the cached model when compatible, else run the extractor and
    /// publish the result. Exclusive `.lock` serializes concurrent builds.
    pub fn build_or_load(
        &self,
        repo: &Path,
        sha: &str,
        extractor: &dyn ModelExtractor,
        clock: &impl Clock,
    ) -> Result<ControlPlaneModel, PolicyError> {
        let dir = self.model_dir(sha);
        fs::create_dir_all(&dir).map_err(|e| PolicyError::ModelStore {
            path: dir.display().to_string(),
            detail: e.to_string(),
        })?;

        let _lock = self.acquire_lock(&dir)?;

        if self.is_reusable(&dir, sha, extractor) {
            return self.load(sha);
        }

        tracing::info!(%sha, "building control-plane model");
        let model = extractor.extract(repo, sha)?;
        self.publish(&dir, sha, &model, extractor.versions(), clock)?;
        Ok(model)
    }

    /// Import a pre-extracted model (e.g. `cg build --from <file>`).
    pub fn import(
        &self,
        sha: &str,
        model: &ControlPlaneModel,
        extractor_versions: BTreeMap<String, String>,
        clock: &impl Clock,
    ) -> Result<(), PolicyError> {
        let dir = self.model_dir(sha);
        fs::create_dir_all(&dir).map_err(|e| PolicyError::ModelStore {
            path: dir.display().to_string(),
            detail: e.to_string(),
        })?;
        let _lock = self.acquire_lock(&dir)?;
        self.publish(&dir, sha, model, extractor_versions, clock)
    }

    fn acquire_lock(&self, dir: &Path) -> Result<File, PolicyError> {
        let lock_path = dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| PolicyError::ModelStore {
                path: lock_path.display().to_string(),
                detail: e.to_string(),
            })?;
        // Blocks until the concurrent builder finishes; both then observe
        // a reusable cache.
        file.lock_exclusive().map_err(|e| PolicyError::ModelStore {
            path: lock_path.display().to_string(),
            detail: e.to_string(),
        })?;
        Ok(file)
    }

    fn is_reusable(&self, dir: &Path, sha: &str, extractor: &dyn ModelExtractor) -> bool {
        if !dir.join("model.json").is_file() {
            return false;
        }
        match self.read_metadata(dir) {
            Ok(meta) => {
                meta.schema_version == SCHEMA_VERSION
                    && meta.base_sha == sha
                    && meta.extractor_versions == extractor.versions()
            }
            Err(_) => false,
        }
    }

    fn read_metadata(&self, dir: &Path) -> Result<ModelMetadata, PolicyError> {
        let path = dir.join("metadata.json");
        let json = fs::read_to_string(&path).map_err(|e| PolicyError::ModelStore {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| PolicyError::ModelStore {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    fn publish(
        &self,
        dir: &Path,
        sha: &str,
        model: &ControlPlaneModel,
        extractor_versions: BTreeMap<String, String>,
        clock: &impl Clock,
    ) -> Result<(), PolicyError> {
        let model_json =
            serde_json::to_vec_pretty(model).map_err(|e| PolicyError::ModelStore {
                path: dir.display().to_string(),
                detail: e.to_string(),
            })?;
        let metadata = ModelMetadata {
            schema_version: SCHEMA_VERSION,
            extractor_versions,
            base_sha: sha.to_string(),
            model_hash: format!("{:x}", Sha256::digest(&model_json)),
            created_at: clock.iso_ms(),
        };
        let metadata_json =
            serde_json::to_vec_pretty(&metadata).map_err(|e| PolicyError::ModelStore {
                path: dir.display().to_string(),
                detail: e.to_string(),
            })?;

        write_atomic(&dir.join("model.json"), &model_json)?;
        write_atomic(&dir.join("metadata.json"), &metadata_json)?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PolicyError> {
    let display = path.display().to_string();
    let store_err = |detail: String| PolicyError::ModelStore { path: display.clone(), detail };
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp).map_err(|e| store_err(e.to_string()))?;
        file.write_all(bytes).map_err(|e| store_err(e.to_string()))?;
        file.sync_all().map_err(|e| store_err(e.to_string()))?;
    }
    fs::rename(&tmp, path).map_err(|e| store_err(e.to_string()))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
