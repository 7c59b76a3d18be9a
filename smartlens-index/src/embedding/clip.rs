//! CLIP ViT-B/32 embeddings via fastembed
//!
//! The vision and text towers of the same CLIP checkpoint project into one
//! 512-dimensional space, so a text query can be compared directly with the
//! stored image vectors.

use std::path::Path;

use anyhow::Context;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use image::DynamicImage;

use super::provider::{EmbeddingProvider, ImageInput};
use crate::error::{LensError, Result};
use crate::item::Embedding;

/// Model identifier stamped into stores built with [`ClipEmbedding`]
pub const CLIP_MODEL_ID: &str = "clip-ViT-B-32";

/// CLIP configuration
#[derive(Debug, Clone)]
pub struct ClipConfig {
    /// Images per ONNX inference call (default: 32)
    pub batch_size: usize,
    /// Print download progress when fetching model files (default: false)
    pub show_download_progress: bool,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            show_download_progress: false,
        }
    }
}

/// fastembed reports `anyhow` errors; keep the context chain in the message
fn model_error(e: anyhow::Error) -> LensError {
    LensError::model(format!("{:#}", e))
}

fn embedding_error(e: anyhow::Error) -> LensError {
    LensError::embedding(format!("{:#}", e))
}

/// Decode every input, recording a per-item error for the ones that fail
///
/// Returns one outcome slot per input, filled only for failures, plus the
/// decoded images tagged with their input position.
fn decode_images(
    images: &[ImageInput],
) -> (Vec<Option<Result<Embedding>>>, Vec<(usize, DynamicImage)>) {
    let mut outcomes = Vec::with_capacity(images.len());
    let mut decoded = Vec::new();

    for (idx, input) in images.iter().enumerate() {
        match image::load_from_memory(&input.bytes) {
            Ok(pixels) => {
                decoded.push((idx, pixels));
                outcomes.push(None);
            }
            Err(e) => outcomes.push(Some(Err(LensError::embedding(format!(
                "Cannot decode {}: {}",
                input.id, e
            ))))),
        }
    }
    (outcomes, decoded)
}

/// fastembed CLIP model pair
pub struct ClipEmbedding {
    image: ImageEmbedding,
    text: TextEmbedding,
    config: ClipConfig,
    dimension: usize,
}

impl ClipEmbedding {
    /// Load both CLIP towers, downloading them into `cache_dir` on first use
    pub fn from_cache_dir(cache_dir: &Path, config: ClipConfig) -> Result<Self> {
        log::info!("Loading CLIP ViT-B/32 from cache: {}", cache_dir.display());

        let image = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(config.show_download_progress),
        )
        .context("Failed to load CLIP vision model")
        .map_err(model_error)?;

        let text = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(config.show_download_progress),
        )
        .context("Failed to load CLIP text model")
        .map_err(model_error)?;

        // Get dimension by encoding test string
        let sample = text
            .embed(vec!["test"], None)
            .context("Failed to encode test string")
            .map_err(model_error)?;
        let dimension = sample
            .first()
            .map(Vec::len)
            .ok_or_else(|| LensError::model("CLIP text model returned no embedding"))?;

        log::info!("Loaded CLIP ({}d, batch {})", dimension, config.batch_size);

        Ok(Self {
            image,
            text,
            config,
            dimension,
        })
    }
}

impl EmbeddingProvider for ClipEmbedding {
    fn model_id(&self) -> &str {
        CLIP_MODEL_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_images(&self, images: &[ImageInput]) -> Result<Vec<Result<Embedding>>> {
        // fastembed fails the whole call on one bad image, so decode each first
        // and embed exactly the bytes that were read
        let (mut outcomes, mut decoded) = decode_images(images);

        let batch_size = self.config.batch_size.max(1);
        while !decoded.is_empty() {
            let rest = decoded.split_off(batch_size.min(decoded.len()));
            let (indices, pixels): (Vec<usize>, Vec<DynamicImage>) =
                std::mem::replace(&mut decoded, rest).into_iter().unzip();

            let embeddings = self
                .image
                .embed_images(pixels)
                .context("CLIP image batch failed")
                .map_err(embedding_error)?;

            if embeddings.len() != indices.len() {
                return Err(LensError::embedding(format!(
                    "CLIP returned {} embeddings for {} images",
                    embeddings.len(),
                    indices.len()
                )));
            }

            for (idx, embedding) in indices.into_iter().zip(embeddings) {
                outcomes[idx] = Some(Ok(embedding));
            }
        }

        Ok(outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Err(LensError::embedding("missing embedding"))))
            .collect())
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        self.text
            .embed(texts.to_vec(), None)
            .context("Failed to encode texts")
            .map_err(embedding_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn input(name: &str, bytes: Vec<u8>) -> ImageInput {
        ImageInput {
            id: ItemId::from(name),
            // Nothing exists here; decoding must only use the bytes
            path: PathBuf::from("/nonexistent").join(name),
            bytes,
        }
    }

    #[test]
    fn test_decode_uses_bytes_not_path() {
        let images = vec![input("red.png", png_bytes(3, 2))];
        let (outcomes, decoded) = decode_images(&images);

        assert!(outcomes[0].is_none());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, 0);
        assert_eq!((decoded[0].1.width(), decoded[0].1.height()), (3, 2));
    }

    #[test]
    fn test_decode_failure_is_per_item() {
        let images = vec![
            input("a.png", png_bytes(1, 1)),
            input("broken.jpg", b"not an image".to_vec()),
            input("c.png", png_bytes(2, 2)),
        ];
        let (outcomes, decoded) = decode_images(&images);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_none());
        assert!(matches!(outcomes[1], Some(Err(LensError::Embedding(_)))));
        assert!(outcomes[2].is_none());

        let positions: Vec<usize> = decoded.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(positions, vec![0, 2]);
    }
}
