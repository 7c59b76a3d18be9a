//! Index session for the command line
//!
//! Owns the embedding engine, store and image source for one invocation and
//! runs the blocking index and search work off the async runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use smartlens_index::embedding::{is_model_cached, resolve_models_dir};
use smartlens_index::{
    ClipConfig, DirectorySource, HashEmbedding, IndexReport, Indexer, ItemSource, LensConfig,
    QueryEngine, ResolvedHit, RocksStore, StoreOptions, StoreStats, VectorEngine, VectorStore,
};
use tokio::sync::RwLock;

use crate::error::{CliError, CliResult};

/// Embedding backend selectable from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// CLIP ViT-B/32 (downloads the model on first use)
    #[default]
    Clip,
    /// Deterministic content hash, no model required
    Hash,
}

/// Search hit located on disk
#[derive(Debug, Clone, Serialize)]
pub struct FoundImage {
    #[serde(flatten)]
    pub hit: ResolvedHit,
    pub path: PathBuf,
    /// False when the file was moved or deleted after indexing
    pub exists: bool,
}

/// Store statistics alongside the state of the image folder
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    #[serde(flatten)]
    pub store: StoreStats,
    /// Images currently in the folder, indexed or not
    pub folder_images: usize,
    pub images_dir: PathBuf,
    pub store_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// `None` for providers without a model download
    pub model_cached: Option<bool>,
}

struct SessionState {
    store: Arc<RocksStore>,
    source: DirectorySource,
    models_dir: Option<PathBuf>,
    indexer: Indexer,
    query: QueryEngine,
}

impl SessionState {
    fn locate(&self, hit: ResolvedHit) -> FoundImage {
        let path = self.source.root().join(&hit.filename);
        let exists = path.is_file();
        if !exists {
            tracing::warn!("Image {} not found on disk", hit.filename);
        }
        FoundImage { hit, path, exists }
    }

    fn stats(&self) -> CliResult<SessionStats> {
        let manifest = self.store.manifest();
        Ok(SessionStats {
            store: self.store.stats()?,
            folder_images: self.source.scan()?.items.len(),
            images_dir: self.source.root().to_path_buf(),
            store_path: self.store.path().to_path_buf(),
            created_at: manifest.created_at,
            model_cached: self.models_dir.as_deref().map(is_model_cached),
        })
    }
}

/// Lazily initialized index session
///
/// Wraps the blocking index library and provides async methods for the CLI
/// runtime.
pub struct LensSession {
    state: Arc<RwLock<Option<Arc<SessionState>>>>,
    config: LensConfig,
    provider: ProviderKind,
}

impl LensSession {
    pub fn new(config: LensConfig, provider: ProviderKind) -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            config,
            provider,
        }
    }

    /// Folder the session indexes
    pub fn images_dir(&self) -> &Path {
        &self.config.source.root
    }

    /// Load the embedding model and open the store
    ///
    /// # Errors
    /// Returns error if model loading fails or the store was built with a
    /// different model or metric.
    pub async fn initialize(&self) -> CliResult<()> {
        let config = self.config.clone();
        let provider = self.provider;

        tracing::info!("Initializing session ({:?} provider)", provider);
        tracing::debug!("Images: {:?}, store: {:?}", config.source.root, config.store.path);

        let state = tokio::task::spawn_blocking(move || build_state(&config, provider))
            .await?
            .map_err(|e| {
                tracing::error!("Session initialization failed: {}", e);
                e
            })?;

        *self.state.write().await = Some(Arc::new(state));
        tracing::info!("Session ready");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Embed and store every image not yet indexed
    pub async fn index(&self) -> CliResult<IndexReport> {
        let state = self.get_state().await?;
        let report =
            tokio::task::spawn_blocking(move || state.indexer.run(&state.source)).await??;
        Ok(report)
    }

    /// Top-`k` images for a text query, `k` defaulting to the configured count
    pub async fn search(&self, query: &str, k: Option<usize>) -> CliResult<Vec<FoundImage>> {
        let state = self.get_state().await?;
        let k = k.unwrap_or(self.config.search.top_k);
        let query = query.to_string();

        tokio::task::spawn_blocking(move || -> CliResult<Vec<FoundImage>> {
            let hits = state.query.search_resolved(&query, k)?;
            Ok(hits.into_iter().map(|hit| state.locate(hit)).collect())
        })
        .await?
    }

    /// Store statistics plus a fresh count of the image folder
    pub async fn stats(&self) -> CliResult<SessionStats> {
        let state = self.get_state().await?;
        tokio::task::spawn_blocking(move || state.stats()).await?
    }

    async fn get_state(&self) -> CliResult<Arc<SessionState>> {
        self.state
            .read()
            .await
            .clone()
            .ok_or(CliError::NotInitialized)
    }
}

fn build_state(config: &LensConfig, provider: ProviderKind) -> CliResult<SessionState> {
    let (engine, models_dir) = match provider {
        ProviderKind::Clip => {
            let dir = resolve_models_dir(config.model.models_dir.as_deref())?;
            if !is_model_cached(&dir) {
                tracing::info!("CLIP model not cached, downloading into {:?}", dir);
            }
            let engine = VectorEngine::clip(
                Some(&dir),
                ClipConfig {
                    show_download_progress: config.model.show_download_progress,
                    ..ClipConfig::default()
                },
            )?;
            (engine, Some(dir))
        }
        ProviderKind::Hash => (VectorEngine::new(Arc::new(HashEmbedding::default())), None),
    };
    let engine = Arc::new(engine);

    let store = RocksStore::open_with(
        &config.store.path,
        engine.store_config(config.store.metric),
        StoreOptions {
            hnsw_threshold: config.store.hnsw_threshold,
        },
    )?;
    let source = DirectorySource::new(&config.source)?;

    let indexer = Indexer::with_config(engine.clone(), store.clone(), config.indexer.clone());
    let query = QueryEngine::new(engine, store.clone())?;

    Ok(SessionState {
        store,
        source,
        models_dir,
        indexer,
        query,
    })
}
