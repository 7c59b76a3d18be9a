//! Vector stores
//!
//! A store maps [`ItemId`] to [`IndexEntry`] and answers exact top-K queries
//! under the metric it was created with. [`RocksStore`] persists to disk,
//! [`InMemoryStore`] backs tests.

mod hnsw;
mod manifest;
mod memory;
mod ranking;
mod rocks;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::item::{IndexEntry, ItemId};
use crate::metric::DistanceMetric;

pub use manifest::{StoreManifest, FORMAT_VERSION};
pub use memory::InMemoryStore;
pub use ranking::top_k;
pub use rocks::{RocksStore, StoreOptions};

/// Configuration fixed when a store is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub metric: DistanceMetric,
    /// Embedding model that produced every vector in the store
    pub model_id: String,
    pub dimension: usize,
}

impl StoreConfig {
    pub fn new(metric: DistanceMetric, model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            metric,
            model_id: model_id.into(),
            dimension,
        }
    }

    /// Fail with `ConfigMismatch` unless `requested` equals this config
    pub fn ensure_matches(&self, requested: &StoreConfig) -> Result<()> {
        if self.metric != requested.metric {
            return Err(LensError::config_mismatch(format!(
                "store uses metric {}, requested {}",
                self.metric, requested.metric
            )));
        }
        if self.model_id != requested.model_id {
            return Err(LensError::config_mismatch(format!(
                "store was built with model {}, requested {}",
                self.model_id, requested.model_id
            )));
        }
        if self.dimension != requested.dimension {
            return Err(LensError::config_mismatch(format!(
                "store holds {}d vectors, requested {}d",
                self.dimension, requested.dimension
            )));
        }
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(LensError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Reject a batch before any write if one vector has the wrong length
    fn check_batch(&self, entries: &[IndexEntry]) -> Result<()> {
        entries
            .iter()
            .try_for_each(|entry| self.check_vector(&entry.embedding))
    }
}

/// One ranked query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ItemId,
    pub distance: f32,
}

/// Outcome of one insert call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: Vec<ItemId>,
    /// Ids rejected because they were already stored or repeated in the batch
    pub duplicates: Vec<ItemId>,
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_entries: usize,
    pub metric: DistanceMetric,
    pub model_id: String,
    pub dimension: usize,
}

/// Persistent associative store with nearest-neighbour queries
///
/// Writes are serialized by the implementation; handles are shared behind
/// `Arc` between the indexer and the query engine.
pub trait VectorStore: Send + Sync {
    /// Configuration fixed at creation
    fn config(&self) -> &StoreConfig;

    /// All indexed ids
    fn list_ids(&self) -> Result<BTreeSet<ItemId>>;

    /// Append new entries, rejecting duplicate ids one by one
    ///
    /// An entry whose id is already stored, or repeats an earlier entry of the
    /// same batch, is reported in [`InsertReport::duplicates`] and skipped.
    /// Accepted entries are durable once this returns.
    fn insert(&self, entries: Vec<IndexEntry>) -> Result<InsertReport>;

    /// Insert a single entry, failing with `DuplicateId` if it already exists
    fn insert_one(&self, entry: IndexEntry) -> Result<()> {
        let report = self.insert(vec![entry])?;
        match report.duplicates.into_iter().next() {
            Some(id) => Err(LensError::DuplicateId(id)),
            None => Ok(()),
        }
    }

    /// The `k` nearest entries, ascending by distance, ties by id
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Fetch one entry
    fn get(&self, id: &ItemId) -> Result<Option<IndexEntry>>;

    /// Number of stored entries
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn stats(&self) -> Result<StoreStats> {
        let config = self.config();
        Ok(StoreStats {
            total_entries: self.len()?,
            metric: config.metric,
            model_id: config.model_id.clone(),
            dimension: config.dimension,
        })
    }
}
