//! Store manifest
//!
//! Every RocksDB store carries a JSON manifest recording the on-disk format
//! version, the distance metric, and the model that produced its vectors.
//! Opening a store with a different configuration is refused.

use chrono::{DateTime, Utc};
use rocksdb::{IteratorMode, WriteOptions, DB};
use serde::{Deserialize, Serialize};

use super::StoreConfig;
use crate::error::{LensError, Result};

/// Manifest key, outside the entry key space
const MANIFEST_KEY: &[u8] = b"_manifest";

/// Prefix of entry keys
pub(crate) const ENTRY_PREFIX: &str = "entry:";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Persisted store header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format_version: u32,
    #[serde(flatten)]
    pub config: StoreConfig,
    pub created_at: DateTime<Utc>,
}

impl StoreManifest {
    fn new(config: StoreConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            config,
            created_at: Utc::now(),
        }
    }
}

/// Read and validate the manifest, or stamp a fresh store with one
pub(crate) fn load_or_init(db: &DB, requested: &StoreConfig) -> Result<StoreManifest> {
    match db.get(MANIFEST_KEY)? {
        Some(bytes) => {
            let manifest: StoreManifest = serde_json::from_slice(&bytes)?;

            log::info!(
                "Store format version: {} (current: {})",
                manifest.format_version,
                FORMAT_VERSION
            );

            if manifest.format_version > FORMAT_VERSION {
                return Err(LensError::config_mismatch(format!(
                    "store format v{} is newer than supported v{}",
                    manifest.format_version, FORMAT_VERSION
                )));
            }
            manifest.config.ensure_matches(requested)?;
            Ok(manifest)
        }
        None => {
            if has_entries(db)? {
                return Err(LensError::config_mismatch(
                    "store contains entries but no manifest; model and metric are unknown",
                ));
            }

            let manifest = StoreManifest::new(requested.clone());
            let mut write_opts = WriteOptions::default();
            write_opts.set_sync(true);
            db.put_opt(MANIFEST_KEY, serde_json::to_vec(&manifest)?, &write_opts)?;

            log::info!(
                "Created store manifest ({}, {}, {}d)",
                requested.metric,
                requested.model_id,
                requested.dimension
            );
            Ok(manifest)
        }
    }
}

fn has_entries(db: &DB) -> Result<bool> {
    for item in db.iterator(IteratorMode::Start) {
        let (key, _) = item?;
        if key.starts_with(ENTRY_PREFIX.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}
