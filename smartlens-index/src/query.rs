//! Text-to-image search
//!
//! Embeds a free-text query with the same model that indexed the store and
//! returns the nearest images.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::VectorEngine;
use crate::error::{LensError, Result};
use crate::storage::{SearchHit, VectorStore};

/// Results returned when the caller does not ask for a count
pub const DEFAULT_TOP_K: usize = 3;

/// Search hit joined with its stored filename
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedHit {
    pub id: String,
    pub filename: String,
    pub distance: f32,
}

/// Answers top-K queries against one store
pub struct QueryEngine {
    engine: Arc<VectorEngine>,
    store: Arc<dyn VectorStore>,
}

impl QueryEngine {
    /// Pair an engine with a store it can query
    ///
    /// Fails with `ConfigMismatch` when the store was built by another model.
    pub fn new(engine: Arc<VectorEngine>, store: Arc<dyn VectorStore>) -> Result<Self> {
        let stored = store.config();
        stored.ensure_matches(&engine.store_config(stored.metric))?;
        Ok(Self { engine, store })
    }

    /// The `k` images nearest to `text`, closest first
    ///
    /// Surrounding whitespace is ignored. A blank query is rejected before
    /// anything is embedded or read.
    pub fn search(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LensError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.engine.embed_text(text)?;
        let hits = self.store.query(&vector, k)?;
        log::debug!("Query {:?} returned {} hits", text, hits.len());
        Ok(hits)
    }

    pub fn search_default(&self, text: &str) -> Result<Vec<SearchHit>> {
        self.search(text, DEFAULT_TOP_K)
    }

    /// Attach display filenames to hits
    pub fn resolve(&self, hits: Vec<SearchHit>) -> Result<Vec<ResolvedHit>> {
        hits.into_iter()
            .map(|hit| {
                let filename = match self.store.get(&hit.id)? {
                    Some(entry) => entry.filename().to_string(),
                    None => hit.id.to_string(),
                };
                Ok(ResolvedHit {
                    id: hit.id.to_string(),
                    filename,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Search and resolve in one step
    pub fn search_resolved(&self, text: &str, k: usize) -> Result<Vec<ResolvedHit>> {
        let hits = self.search(text, k)?;
        self.resolve(hits)
    }
}
