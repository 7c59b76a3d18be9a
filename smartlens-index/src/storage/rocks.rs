//! RocksDB storage with exact and HNSW-assisted ranking
//!
//! Persistent storage for index entries using RocksDB with LZ4 compression.
//! Entries are cached in memory on open; queries scan the cache exactly, or
//! narrow candidates through an instant-distance HNSW graph once the store
//! outgrows `hnsw_threshold`.

use parking_lot::{Mutex, RwLock};
use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use super::hnsw::{HnswIndex, EF_SEARCH};
use super::manifest::{self, StoreManifest, ENTRY_PREFIX};
use super::{top_k, InsertReport, SearchHit, StoreConfig, VectorStore};
use crate::error::Result;
use crate::item::{IndexEntry, ItemId};

/// HNSW candidates fetched per requested result before exact re-ranking
const OVERSAMPLE: usize = 4;

/// Tuning knobs that do not affect stored data
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Entry count above which queries go through the HNSW graph (default: 10000)
    pub hnsw_threshold: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            hnsw_threshold: 10_000,
        }
    }
}

/// Live handles by canonical path; RocksDB allows one handle per directory
fn open_stores() -> &'static Mutex<HashMap<PathBuf, Weak<RocksStore>>> {
    static OPEN_STORES: OnceLock<Mutex<HashMap<PathBuf, Weak<RocksStore>>>> = OnceLock::new();
    OPEN_STORES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// RocksDB-backed vector store
pub struct RocksStore {
    db: DB,
    path: PathBuf,
    manifest: StoreManifest,
    options: StoreOptions,
    entries: RwLock<BTreeMap<ItemId, IndexEntry>>,
    hnsw_index: RwLock<Option<HnswIndex>>,
}

impl RocksStore {
    /// Open or create the store at `path`
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Arc<Self>> {
        Self::open_with(path, config, StoreOptions::default())
    }

    /// Open or create the store at `path` with explicit options
    ///
    /// Opening a path that already has a live handle in this process returns
    /// that handle after checking `config` against it.
    pub fn open_with(
        path: impl AsRef<Path>,
        config: StoreConfig,
        options: StoreOptions,
    ) -> Result<Arc<Self>> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let canonical = std::fs::canonicalize(path)?;

        let mut registry = open_stores().lock();
        if let Some(existing) = registry.get(&canonical).and_then(Weak::upgrade) {
            existing.config().ensure_matches(&config)?;
            log::debug!("Reusing open store at: {}", canonical.display());
            return Ok(existing);
        }

        let store = Arc::new(Self::open_db(canonical.clone(), config, options)?);
        registry.retain(|_, handle| handle.strong_count() > 0);
        registry.insert(canonical, Arc::downgrade(&store));
        Ok(store)
    }

    fn open_db(path: PathBuf, config: StoreConfig, options: StoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_bytes_per_sync(1048576); // 1MB
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, &path)?;
        let manifest = manifest::load_or_init(&db, &config)?;

        log::info!("Store opened at: {}", path.display());

        let store = Self {
            db,
            path,
            manifest,
            options,
            entries: RwLock::new(BTreeMap::new()),
            hnsw_index: RwLock::new(None),
        };

        store.load_cache()?;
        Ok(store)
    }

    /// Load existing entries into cache on open
    fn load_cache(&self) -> Result<()> {
        let mut loaded = BTreeMap::new();
        let mut skipped = 0;
        let dimension = self.manifest.config.dimension;

        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);

            let Some(id) = key_str.strip_prefix(ENTRY_PREFIX) else {
                continue;
            };

            // Gracefully handle deserialization errors
            match bincode::deserialize::<IndexEntry>(&value) {
                Ok(entry) if entry.dimension() == dimension => {
                    loaded.insert(entry.id.clone(), entry);
                }
                Ok(entry) => {
                    log::warn!(
                        "Entry {} has {}d vector, store is {}d. Skipping.",
                        id,
                        entry.dimension(),
                        dimension
                    );
                    skipped += 1;
                }
                Err(e) => {
                    log::warn!("Failed to deserialize entry {}: {}. Skipping.", id, e);
                    skipped += 1;
                }
            }
        }

        if !loaded.is_empty() {
            log::info!("Loaded {} entries from disk", loaded.len());
        }
        if skipped > 0 {
            log::warn!("Skipped {} entries due to decoding errors", skipped);
        }

        *self.entries.write() = loaded;
        Ok(())
    }

    fn entry_key(id: &ItemId) -> String {
        format!("{}{}", ENTRY_PREFIX, id)
    }

    /// Rank through the HNSW graph, or `None` when it cannot answer fully
    fn approximate_query(
        &self,
        entries: &BTreeMap<ItemId, IndexEntry>,
        vector: &[f32],
        k: usize,
    ) -> Option<Vec<SearchHit>> {
        let limit = k.saturating_mul(OVERSAMPLE);
        if limit > EF_SEARCH {
            return None;
        }

        if self.hnsw_index.read().is_none() {
            let mut index = self.hnsw_index.write();
            if index.is_none() {
                *index = Some(HnswIndex::build(
                    entries.iter().map(|(id, e)| (id, e.embedding.as_slice())),
                    self.manifest.config.metric,
                ));
            }
        }

        let index_guard = self.hnsw_index.read();
        let index = index_guard.as_ref()?;
        let candidates = index.candidates(vector, limit);

        let mut ranked = top_k(
            candidates
                .iter()
                .filter_map(|id| entries.get(id).map(|e| (id, e.embedding.as_slice()))),
            vector,
            self.manifest.config.metric,
            candidates.len(),
        );

        if ranked.len() < k.min(entries.len()) {
            log::debug!("HNSW returned {} of {} hits, falling back", ranked.len(), k);
            return None;
        }

        // The graph picks arbitrarily among equal distances, so a tie inside
        // the result or at its boundary can hide a smaller id
        if has_tie_within(&ranked, k) {
            log::debug!("Equal distances among HNSW candidates, falling back");
            return None;
        }

        ranked.truncate(k);
        Some(ranked)
    }

    /// Persisted manifest
    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    /// Canonical directory of this store
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether any of the first `k` hits, or the first one past them, share a distance
fn has_tie_within(ranked: &[SearchHit], k: usize) -> bool {
    let end = (k + 1).min(ranked.len());
    ranked[..end]
        .windows(2)
        .any(|pair| pair[0].distance == pair[1].distance)
}

impl VectorStore for RocksStore {
    fn config(&self) -> &StoreConfig {
        &self.manifest.config
    }

    fn list_ids(&self) -> Result<BTreeSet<ItemId>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn insert(&self, entries: Vec<IndexEntry>) -> Result<InsertReport> {
        self.manifest.config.check_batch(&entries)?;

        // Holding the cache write lock serializes writers
        let mut stored = self.entries.write();
        let mut seen = HashSet::new();
        let mut report = InsertReport::default();
        let mut batch = WriteBatch::default();
        let mut accepted = Vec::new();

        for entry in entries {
            if stored.contains_key(&entry.id) || !seen.insert(entry.id.clone()) {
                log::debug!("Rejecting duplicate entry: {}", entry.id);
                report.duplicates.push(entry.id);
                continue;
            }
            batch.put(
                Self::entry_key(&entry.id).as_bytes(),
                bincode::serialize(&entry)?,
            );
            accepted.push(entry);
        }

        if accepted.is_empty() {
            return Ok(report);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.write_opt(batch, &write_opts)?;

        for entry in accepted {
            report.inserted.push(entry.id.clone());
            stored.insert(entry.id.clone(), entry);
        }
        *self.hnsw_index.write() = None;

        Ok(report)
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.manifest.config.check_vector(vector)?;
        if k == 0 {
            return Ok(vec![]);
        }

        let entries = self.entries.read();
        if entries.len() > self.options.hnsw_threshold {
            if let Some(hits) = self.approximate_query(&entries, vector, k) {
                return Ok(hits);
            }
        }

        Ok(top_k(
            entries.iter().map(|(id, e)| (id, e.embedding.as_slice())),
            vector,
            self.manifest.config.metric,
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
    use crate::item::FILENAME_KEY;
    use crate::metric::DistanceMetric;
    use tempfile::TempDir;

    fn config() -> StoreConfig {
        StoreConfig::new(DistanceMetric::Cosine, "test-model", 3)
    }

    fn entry(id: &str, v: [f32; 3]) -> IndexEntry {
        IndexEntry::new(ItemId::new(id), v.to_vec()).with_metadata(FILENAME_KEY, id)
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let original = entry("a.jpg", [1.0, 0.0, 0.0]);

        {
            let store = RocksStore::open(temp_dir.path(), config()).unwrap();
            store.insert(vec![original.clone()]).unwrap();
        }

        let store = RocksStore::open(temp_dir.path(), config()).unwrap();
        let ids = store.list_ids().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.get(&ItemId::new("a.jpg")).unwrap(), Some(original));
    }

    #[test]
    fn test_open_is_idempotent_in_process() {
        let temp_dir = TempDir::new().unwrap();
        let first = RocksStore::open(temp_dir.path(), config()).unwrap();
        let second = RocksStore::open(temp_dir.path(), config()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first.insert(vec![entry("a.jpg", [1.0, 0.0, 0.0])]).unwrap();
        assert_eq!(second.len().unwrap(), 1);
    }

    #[test]
    fn test_open_with_other_metric_fails() {
        let temp_dir = TempDir::new().unwrap();
        let _store = RocksStore::open(temp_dir.path(), config()).unwrap();

        let l2 = StoreConfig::new(DistanceMetric::L2, "test-model", 3);
        let err = RocksStore::open(temp_dir.path(), l2).err().unwrap();
        assert!(matches!(err, LensError::ConfigMismatch(_)));
    }

    #[test]
    fn test_reopen_after_drop_with_other_model_fails() {
        let temp_dir = TempDir::new().unwrap();
        drop(RocksStore::open(temp_dir.path(), config()).unwrap());

        let other = StoreConfig::new(DistanceMetric::Cosine, "other-model", 3);
        let err = RocksStore::open(temp_dir.path(), other).err().unwrap();
        assert!(matches!(err, LensError::ConfigMismatch(_)));
    }

    #[test]
    fn test_duplicate_insert_is_rejected_per_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open(temp_dir.path(), config()).unwrap();
        store.insert(vec![entry("a.jpg", [1.0, 0.0, 0.0])]).unwrap();

        let report = store
            .insert(vec![
                entry("a.jpg", [0.0, 1.0, 0.0]),
                entry("b.jpg", [0.0, 0.0, 1.0]),
            ])
            .unwrap();

        assert_eq!(report.inserted, vec![ItemId::new("b.jpg")]);
        assert_eq!(report.duplicates, vec![ItemId::new("a.jpg")]);

        let a = store.get(&ItemId::new("a.jpg")).unwrap().unwrap();
        assert_eq!(a.embedding, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_insert_wrong_dimension_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open(temp_dir.path(), config()).unwrap();

        let bad = IndexEntry::new(ItemId::new("bad.jpg"), vec![1.0, 0.0]);
        let err = store
            .insert(vec![entry("ok.jpg", [1.0, 0.0, 0.0]), bad])
            .unwrap_err();
        assert!(matches!(err, LensError::DimensionMismatch { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_query_exact_ranking() {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open(temp_dir.path(), config()).unwrap();
        store
            .insert(vec![
                entry("x.jpg", [1.0, 0.0, 0.0]),
                entry("y.jpg", [0.0, 1.0, 0.0]),
                entry("xy.jpg", [1.0, 1.0, 0.0]),
            ])
            .unwrap();

        let hits = store.query(&[1.0, 0.1, 0.0], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x.jpg", "xy.jpg"]);
        assert!(store.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_hnsw_path_matches_exact_top_hit() {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open_with(
            temp_dir.path(),
            config(),
            StoreOptions { hnsw_threshold: 10 },
        )
        .unwrap();

        let entries: Vec<IndexEntry> = (0..40)
            .map(|i| {
                let angle = i as f32 * 0.05;
                entry(&format!("{i:02}.jpg"), [angle.cos(), angle.sin(), 0.0])
            })
            .collect();
        store.insert(entries).unwrap();

        let angle = 12.0_f32 * 0.05;
        let hits = store.query(&[angle.cos(), angle.sin(), 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id.as_str(), "12.jpg");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_hnsw_path_breaks_ties_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open_with(
            temp_dir.path(),
            config(),
            StoreOptions { hnsw_threshold: 10 },
        )
        .unwrap();

        // Same photo saved under many names
        let entries: Vec<IndexEntry> = (0..200)
            .map(|i| entry(&format!("{i:03}.jpg"), [1.0, 0.0, 0.0]))
            .collect();
        store.insert(entries).unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["000.jpg", "001.jpg", "002.jpg"]);
    }

    #[test]
    fn test_tie_detection() {
        let hit = |id: &str, distance: f32| SearchHit {
            id: ItemId::new(id),
            distance,
        };
        let distinct = vec![hit("a", 0.1), hit("b", 0.2), hit("c", 0.3)];
        assert!(!has_tie_within(&distinct, 2));

        let boundary = vec![hit("a", 0.1), hit("b", 0.2), hit("c", 0.2)];
        assert!(has_tie_within(&boundary, 2));
        assert!(!has_tie_within(&boundary, 1));
    }

    #[test]
    fn test_corrupt_entry_skipped_on_load() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(temp_dir.path(), config()).unwrap();
            store.insert(vec![entry("a.jpg", [1.0, 0.0, 0.0])]).unwrap();
            store.db.put(b"entry:broken.jpg", b"not bincode").unwrap();
        }

        let store = RocksStore::open(temp_dir.path(), config()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
