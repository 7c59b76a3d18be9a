//! Error types for smartlens-index

use std::path::PathBuf;

use thiserror::Error;

use crate::item::ItemId;

/// Errors that can occur while indexing or querying
#[derive(Debug, Error)]
pub enum LensError {
    /// A single source item could not be read
    #[error("Failed to read {}: {reason}", path.display())]
    SourceRead { path: PathBuf, reason: String },

    /// Store opened with a configuration that contradicts its manifest
    #[error("Store configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Item is already present in the store
    #[error("Duplicate item id: {0}")]
    DuplicateId(ItemId),

    /// The embedding provider failed for a whole batch
    #[error("Indexing failed after {inserted} insertions: {reason}")]
    IndexingFailed { reason: String, inserted: usize },

    /// Query text rejected before any store access
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Vector length does not match the store dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model loading error
    #[error("Model error: {0}")]
    Model(String),

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LensError {
    /// Create a source read error
    pub fn source_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration mismatch error
    pub fn config_mismatch(msg: impl Into<String>) -> Self {
        Self::ConfigMismatch(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for index operations
pub type Result<T> = std::result::Result<T, LensError>;
