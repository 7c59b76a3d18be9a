//! Configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::item::IdPolicy;
use crate::metric::DistanceMetric;
use crate::query::DEFAULT_TOP_K;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    pub source: SourceConfig,
    pub store: StoreSettings,
    pub indexer: IndexerConfig,
    pub search: SearchSettings,
    pub model: ModelSettings,
}

impl LensConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LensError::invalid_path(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&raw)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Where images come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Image directory (default: ./images)
    pub root: PathBuf,
    /// Accepted extensions, matched case-insensitively
    pub extensions: Vec<String>,
    /// Descend into subdirectories (default: false)
    pub recursive: bool,
    pub id_policy: IdPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./images"),
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            recursive: false,
            id_policy: IdPolicy::FileName,
        }
    }
}

/// Vector store location and layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store directory (default: ./smartlens_db)
    pub path: PathBuf,
    /// Metric for newly created stores; must match existing ones
    pub metric: DistanceMetric,
    /// Entry count above which queries use the HNSW graph
    pub hnsw_threshold: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./smartlens_db"),
            metric: DistanceMetric::Cosine,
            hnsw_threshold: 10_000,
        }
    }
}

/// Indexer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Images per provider call (default: 256)
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { batch_size: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Embedding model cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model cache directory; see [`resolve_models_dir`](crate::embedding::resolve_models_dir)
    pub models_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}
