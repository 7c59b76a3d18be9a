//! Vector embedding engine
//!
//! High-level API over an [`EmbeddingProvider`]: query text caching and
//! dimension checks on everything the provider returns.

use super::clip::{ClipConfig, ClipEmbedding};
use super::discovery::resolve_models_dir;
use super::provider::{EmbeddingProvider, ImageInput};
use crate::error::{LensError, Result};
use crate::item::Embedding;
use crate::metric::DistanceMetric;
use crate::storage::StoreConfig;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// Vector embedding engine with caching
///
/// Wraps a provider with a DashMap cache for repeated query texts.
pub struct VectorEngine {
    provider: Arc<dyn EmbeddingProvider>,
    cache: DashMap<String, Embedding>,
    dimension: usize,
}

impl VectorEngine {
    /// Create VectorEngine over any provider
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimension = provider.dimension();
        log::info!(
            "VectorEngine ready ({}, {}d)",
            provider.model_id(),
            dimension
        );

        Self {
            provider,
            cache: DashMap::new(),
            dimension,
        }
    }

    /// Create VectorEngine backed by CLIP
    ///
    /// # Arguments
    /// * `models_dir` - Optional configured model cache directory
    pub fn clip(models_dir: Option<&Path>, config: ClipConfig) -> Result<Self> {
        let cache_dir = resolve_models_dir(models_dir)?;
        let model = ClipEmbedding::from_cache_dir(&cache_dir, config)?;
        Ok(Self::new(Arc::new(model)))
    }

    /// Embed one query text with caching
    pub fn embed_text(&self, text: &str) -> Result<Embedding> {
        // Check cache first
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.clone());
        }

        let embedding = self
            .provider
            .embed_texts(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| LensError::embedding("Provider returned no text embedding"))?;
        self.check_dimension(&embedding)?;

        self.cache.insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Embed one batch of images
    ///
    /// A provider-level failure or a result count that does not match the
    /// input is returned as the outer error. Vectors of the wrong length are
    /// demoted to per-image errors.
    pub fn embed_images(&self, images: &[ImageInput]) -> Result<Vec<Result<Embedding>>> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        let outcomes = self.provider.embed_images(images)?;
        if outcomes.len() != images.len() {
            return Err(LensError::embedding(format!(
                "Provider returned {} results for {} images",
                outcomes.len(),
                images.len()
            )));
        }

        Ok(outcomes
            .into_iter()
            .map(|outcome| outcome.and_then(|v| self.check_dimension(&v).map(|_| v)))
            .collect())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(LensError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Store configuration stamped with this engine's model
    pub fn store_config(&self, metric: DistanceMetric) -> StoreConfig {
        StoreConfig::new(metric, self.model_id(), self.dimension)
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }
}
