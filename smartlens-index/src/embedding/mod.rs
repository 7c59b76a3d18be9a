//! Embedding providers
//!
//! Images and query texts are mapped into one shared vector space. The
//! production provider is CLIP ViT-B/32 through fastembed; tests and offline
//! runs use the deterministic [`HashEmbedding`].

mod clip;
mod discovery;
mod engine;
mod hashed;
mod provider;

pub use clip::{ClipConfig, ClipEmbedding, CLIP_MODEL_ID};
pub use discovery::{is_model_cached, resolve_models_dir};
pub use engine::VectorEngine;
pub use hashed::HashEmbedding;
pub use provider::{EmbeddingProvider, ImageInput};
