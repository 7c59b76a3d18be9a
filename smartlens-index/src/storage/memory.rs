//! In-memory store
//!
//! Same contract as [`RocksStore`](super::RocksStore) without persistence.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use parking_lot::RwLock;

use super::{top_k, InsertReport, SearchHit, StoreConfig, VectorStore};
use crate::error::Result;
use crate::item::{IndexEntry, ItemId};

/// Volatile vector store
pub struct InMemoryStore {
    config: StoreConfig,
    entries: RwLock<BTreeMap<ItemId, IndexEntry>>,
}

impl InMemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl VectorStore for InMemoryStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn list_ids(&self) -> Result<BTreeSet<ItemId>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn insert(&self, entries: Vec<IndexEntry>) -> Result<InsertReport> {
        self.config.check_batch(&entries)?;

        let mut stored = self.entries.write();
        let mut seen = HashSet::new();
        let mut report = InsertReport::default();

        for entry in entries {
            if stored.contains_key(&entry.id) || !seen.insert(entry.id.clone()) {
                report.duplicates.push(entry.id);
                continue;
            }
            report.inserted.push(entry.id.clone());
            stored.insert(entry.id.clone(), entry);
        }

        Ok(report)
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.config.check_vector(vector)?;

        let stored = self.entries.read();
        Ok(top_k(
            stored.iter().map(|(id, e)| (id, e.embedding.as_slice())),
            vector,
            self.config.metric,
            k,
        ))
    }

    fn get(&self, id: &ItemId) -> Result<Option<IndexEntry>> {
        Ok(self.entries.read().get(id).cloned())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LensError;
    use crate::metric::DistanceMetric;

    fn store() -> InMemoryStore {
        InMemoryStore::new(StoreConfig::new(DistanceMetric::L2, "test", 2))
    }

    fn entry(id: &str, v: [f32; 2]) -> IndexEntry {
        IndexEntry::new(ItemId::new(id), v.to_vec())
    }

    #[test]
    fn test_insert_rejects_existing_and_repeated_ids() {
        let store = store();
        store.insert(vec![entry("a.jpg", [0.0, 0.0])]).unwrap();

        let report = store
            .insert(vec![
                entry("a.jpg", [9.0, 9.0]),
                entry("b.jpg", [1.0, 0.0]),
                entry("b.jpg", [2.0, 0.0]),
            ])
            .unwrap();

        assert_eq!(report.inserted, vec![ItemId::new("b.jpg")]);
        assert_eq!(
            report.duplicates,
            vec![ItemId::new("a.jpg"), ItemId::new("b.jpg")]
        );

        // Originals are untouched
        let a = store.get(&ItemId::new("a.jpg")).unwrap().unwrap();
        assert_eq!(a.embedding, vec![0.0, 0.0]);
        let b = store.get(&ItemId::new("b.jpg")).unwrap().unwrap();
        assert_eq!(b.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_insert_one_duplicate_error() {
        let store = store();
        store.insert_one(entry("a.jpg", [0.0, 0.0])).unwrap();
        let err = store.insert_one(entry("a.jpg", [1.0, 1.0])).unwrap_err();
        assert!(matches!(err, LensError::DuplicateId(id) if id.as_str() == "a.jpg"));
    }

    #[test]
    fn test_query_empty_store() {
        assert!(store().query(&[0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_query_wrong_dimension() {
        let err = store().query(&[0.0, 0.0, 0.0], 3).unwrap_err();
        assert!(matches!(err, LensError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_query_ranks_and_bounds() {
        let store = store();
        store
            .insert(vec![
                entry("far.jpg", [5.0, 0.0]),
                entry("near.jpg", [1.0, 0.0]),
                entry("mid.jpg", [2.0, 0.0]),
            ])
            .unwrap();

        let hits = store.query(&[0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near.jpg", "mid.jpg"]);
        assert!((hits[0].distance - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_stats() {
        let store = store();
        store.insert(vec![entry("a.jpg", [0.0, 1.0])]).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.dimension, 2);
        assert_eq!(stats.metric, DistanceMetric::L2);
    }
}
