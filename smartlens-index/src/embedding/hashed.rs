//! Deterministic hash-based embeddings
//!
//! Expands the BLAKE3 XOF of the input bytes into a unit vector. Identical
//! bytes produce identical vectors whether they arrive as an image or as
//! text, which makes ranking in tests fully predictable.

use super::provider::{EmbeddingProvider, ImageInput};
use crate::error::{LensError, Result};
use crate::item::Embedding;
use crate::metric::normalize;

/// Stub provider with no model behind it
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
    model_id: String,
}

impl HashEmbedding {
    pub const DEFAULT_DIMENSION: usize = 64;

    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("blake3-hash-{}d", dimension),
        }
    }

    /// Vector for arbitrary bytes
    pub fn vector_for(&self, bytes: &[u8]) -> Embedding {
        let mut hasher = blake3::Hasher::new();
        hasher.update(bytes);
        let mut buf = vec![0u8; self.dimension * 4];
        hasher.finalize_xof().fill(&mut buf);

        let mut vector: Embedding = buf
            .chunks_exact(4)
            .map(|c| {
                let n = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                (n as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl EmbeddingProvider for HashEmbedding {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_images(&self, images: &[ImageInput]) -> Result<Vec<Result<Embedding>>> {
        Ok(images
            .iter()
            .map(|image| {
                if image.bytes.is_empty() {
                    Err(LensError::embedding(format!("{} is empty", image.id)))
                } else {
                    Ok(self.vector_for(&image.bytes))
                }
            })
            .collect())
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.vector_for(t.as_bytes())).collect())
    }
}
