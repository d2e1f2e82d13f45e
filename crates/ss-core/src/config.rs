use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    pub index: IndexSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// "flat" (exact) or "hnsw" (approximate).
    pub kind: String,
    /// "cosine", "l2" or "ip".
    pub metric: String,
    pub dimension: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Records per index insertion call.
    pub batch_size: usize,
    pub default_limit: usize,
    pub store_path: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            kind: "flat".into(),
            metric: "cosine".into(),
            dimension: 1024,
            m: 16,
            ef_construction: 200,
            ef_search: 128,
            seed: 0x5eed_5eed,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            default_limit: 5,
            store_path: PathBuf::from("store"),
        }
    }
}

impl SeekerConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let idx = &self.index;
        if !matches!(idx.kind.to_lowercase().as_str(), "flat" | "hnsw" | "graph") {
            return Err(CoreError::Config(format!("unknown index kind: {}", idx.kind)));
        }
        if !matches!(
            idx.metric.to_lowercase().as_str(),
            "cosine" | "cos" | "l2" | "euclidean" | "ip" | "dot" | "inner_product"
        ) {
            return Err(CoreError::Config(format!("unknown metric: {}", idx.metric)));
        }
        if idx.dimension == 0 {
            return Err(CoreError::Config("index.dimension must be > 0".into()));
        }
        if idx.m < 2 {
            return Err(CoreError::Config("index.m must be >= 2".into()));
        }
        if idx.ef_construction == 0 || idx.ef_search == 0 {
            return Err(CoreError::Config("index.ef_construction and index.ef_search must be > 0".into()));
        }
        if self.pipeline.batch_size == 0 {
            return Err(CoreError::Config("pipeline.batch_size must be > 0".into()));
        }
        if self.pipeline.default_limit == 0 {
            return Err(CoreError::Config("pipeline.default_limit must be > 0".into()));
        }
        Ok(())
    }
}
