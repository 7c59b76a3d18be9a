//! Item identity and index entry types

use std::collections::BTreeMap;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Embedding vector produced by an [`EmbeddingProvider`](crate::embedding::EmbeddingProvider)
pub type Embedding = Vec<f32>;

/// String metadata stored alongside each embedding
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the item's path relative to the source root
pub const FILENAME_KEY: &str = "filename";

/// Stable identifier of a source item, primary key of the store
///
/// Ids are compared byte-wise: `Beach.JPG` and `beach.jpg` are distinct items.
/// Path-derived ids always use `/` as separator regardless of platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from a path relative to the source root
    ///
    /// Returns `None` for paths that are not valid UTF-8 or that escape the
    /// root (`..`, absolute prefixes).
    pub fn from_relative_path(path: &Path) -> Option<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    /// Build an id from the BLAKE3 digest of the item's bytes
    pub fn from_content(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How item ids are derived from source files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Path relative to the source root
    #[default]
    FileName,
    /// Hex BLAKE3 digest of the file contents
    ContentHash,
}

/// One stored record: identity, embedding and display metadata
///
/// Entries are written once and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ItemId,
    pub embedding: Embedding,
    #[serde(default)]
    pub metadata: Metadata,
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(id: ItemId, embedding: Embedding) -> Self {
        Self {
            id,
            embedding,
            metadata: Metadata::new(),
            indexed_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Filename recorded at indexing time, falling back to the id
    pub fn filename(&self) -> &str {
        self.metadata
            .get(FILENAME_KEY)
            .map(String::as_str)
            .unwrap_or_else(|| self.id.as_str())
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}
