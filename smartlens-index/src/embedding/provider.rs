//! Provider seam between the index and an embedding model

use std::path::PathBuf;

use crate::error::Result;
use crate::item::{Embedding, ItemId};

/// One image handed to a provider for embedding
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub id: ItemId,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Opaque model mapping images and text into a shared vector space
///
/// Implementations are loaded once per process and shared read-only.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier stamped into every store built with this provider
    fn model_id(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed a batch of images in one call
    ///
    /// The outer error means the whole batch failed. Otherwise the result has
    /// one slot per input, in order; an inner error marks an image that could
    /// not be decoded or embedded on its own.
    fn embed_images(&self, images: &[ImageInput]) -> Result<Vec<Result<Embedding>>>;

    /// Embed a batch of texts, one vector per input, in order
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>>;
}
