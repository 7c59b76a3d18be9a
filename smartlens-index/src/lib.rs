//! SmartLens index
//!
//! Incremental image-embedding indexer and text-to-image similarity search
//! over a persistent vector store.
//!
//! ## Features
//!
//! - **Incremental indexing** - Only images missing from the store are read and embedded
//! - **Pluggable embeddings** - CLIP via fastembed, or a deterministic hash provider for tests
//! - **RocksDB persistence** - Durable entries with an HNSW index for large stores
//! - **Exact top-K** - Ranked by distance with ties broken by id
//!
//! ## Example
//!
//! ```ignore
//! use smartlens_index::{
//!     ClipConfig, DirectorySource, Indexer, LensConfig, QueryEngine, RocksStore, VectorEngine,
//! };
//!
//! let config = LensConfig::default();
//! let engine = Arc::new(VectorEngine::clip(None, ClipConfig::default())?);
//! let store = RocksStore::open(&config.store.path, engine.store_config(config.store.metric))?;
//!
//! let source = DirectorySource::new(&config.source)?;
//! Indexer::new(engine.clone(), store.clone()).run(&source)?;
//!
//! let hits = QueryEngine::new(engine, store)?.search("a dog on the beach", 3)?;
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod item;
pub mod metric;
pub mod query;
pub mod source;
pub mod storage;

// Re-exports for convenience
pub use config::{
    IndexerConfig, LensConfig, ModelSettings, SearchSettings, SourceConfig, StoreSettings,
};
pub use embedding::{ClipConfig, EmbeddingProvider, HashEmbedding, ImageInput, VectorEngine};
pub use error::{LensError, Result};
pub use indexer::{IndexOutcome, IndexReport, Indexer};
pub use item::{Embedding, IdPolicy, IndexEntry, ItemId, Metadata};
pub use metric::DistanceMetric;
pub use query::{QueryEngine, ResolvedHit, DEFAULT_TOP_K};
pub use source::{DirectorySource, ItemSource, SkipReason, SkippedItem, SourceItem, SourceScan};
pub use storage::{
    InMemoryStore, InsertReport, RocksStore, SearchHit, StoreConfig, StoreOptions, StoreStats,
    VectorStore,
};
