//! Per-tenant vector index: in-memory cache over JSON snapshots on disk.
//!
//! Each tenant's index is a single file at `<vector_root>/<tenant>/index.json`
//! holding the embedding model name, dimensionality, and all chunks with
//! their vectors. Rebuilds write to a temp file and rename into place, so a
//! crash mid-write leaves the previous snapshot readable. A per-tenant
//! ingest lock serializes rebuilds; readers never block on it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::Chunk;

const INDEX_VERSION: u32 = 1;

/// One tenant's complete searchable index.
#[derive(Debug, Serialize, Deserialize)]
pub struct TenantIndex {
    pub version: u32,
    /// Embedding model the chunk vectors were produced with.
    pub model: String,
    pub dims: usize,
    pub chunks: Vec<Chunk>,
}

impl TenantIndex {
    pub fn new(model: String, dims: usize, chunks: Vec<Chunk>) -> Self {
        Self {
            version: INDEX_VERSION,
            model,
            dims,
            chunks,
        }
    }
}

/// Caches loaded indexes and owns the on-disk snapshots.
pub struct IndexManager {
    vector_root: PathBuf,
    cache: DashMap<String, Arc<TenantIndex>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IndexManager {
    pub fn new(vector_root: impl Into<PathBuf>) -> Self {
        Self {
            vector_root: vector_root.into(),
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn index_path(&self, tenant_id: &str) -> PathBuf {
        self.vector_root.join(tenant_id).join("index.json")
    }

    /// Lock guarding rebuilds for one tenant. Hold it across the whole
    /// extract-embed-replace sequence.
    pub fn ingest_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn exists(&self, tenant_id: &str) -> bool {
        self.cache.contains_key(tenant_id) || self.index_path(tenant_id).exists()
    }

    /// Atomically replace the tenant's index on disk and in cache.
    pub fn replace(&self, tenant_id: &str, index: TenantIndex) -> Result<()> {
        let path = self.index_path(tenant_id);
        let dir = path
            .parent()
            .ok_or_else(|| EngineError::Other("index path has no parent".to_string()))?;
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(&index)
            .map_err(|e| EngineError::IndexIntegrity(format!("serialize failed: {}", e)))?;

        // Write-then-rename keeps the old snapshot intact on failure
        let tmp = dir.join(".index.json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(tenant = tenant_id, chunks = index.chunks.len(), "index replaced");
        self.cache.insert(tenant_id.to_string(), Arc::new(index));
        Ok(())
    }

    /// Fetch the tenant's index, loading the snapshot from disk on first
    /// access. Returns `None` when the tenant has never been ingested.
    pub fn get_or_load(&self, tenant_id: &str) -> Result<Option<Arc<TenantIndex>>> {
        if let Some(cached) = self.cache.get(tenant_id) {
            return Ok(Some(cached.clone()));
        }

        let path = self.index_path(tenant_id);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        let index: TenantIndex = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::IndexIntegrity(format!("snapshot unreadable: {}", e)))?;

        if index.version != INDEX_VERSION {
            return Err(EngineError::IndexIntegrity(format!(
                "snapshot version {} not supported",
                index.version
            )));
        }

        let arc = Arc::new(index);
        self.cache.insert(tenant_id.to_string(), arc.clone());
        Ok(Some(arc))
    }

    /// Drop the cached copy; the next read reloads from disk.
    pub fn evict(&self, tenant_id: &str) {
        self.cache.remove(tenant_id);
    }

    /// Remove the tenant's index from cache and disk.
    pub fn delete(&self, tenant_id: &str) -> Result<()> {
        self.cache.remove(tenant_id);
        let path = self.index_path(tenant_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn vector_root(&self) -> &Path {
        &self.vector_root
    }
}
