//! Incremental indexer
//!
//! Reconciles the items a source currently holds against the ids already in
//! the store and embeds only the difference. Items already stored are never
//! read, embedded or inserted again.

use std::sync::Arc;

use serde::Serialize;

use crate::config::IndexerConfig;
use crate::embedding::{ImageInput, VectorEngine};
use crate::error::{LensError, Result};
use crate::item::{IndexEntry, ItemId, FILENAME_KEY};
use crate::source::{ItemSource, SkipReason, SkippedItem, SourceItem};
use crate::storage::VectorStore;

/// Whether a run had anything to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Every scanned item was already indexed
    NoOp,
    /// New items were embedded (some may still have been skipped)
    Indexed,
}

/// Per-run summary
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub outcome: IndexOutcome,
    /// Items found by the source scan
    pub scanned: usize,
    /// Scanned items already present in the store
    pub already_indexed: usize,
    pub inserted: Vec<ItemId>,
    /// New items another writer stored first
    pub duplicates: Vec<ItemId>,
    pub skipped: Vec<SkippedItem>,
}

impl IndexReport {
    fn new(scanned: usize, already_indexed: usize, skipped: Vec<SkippedItem>) -> Self {
        Self {
            outcome: IndexOutcome::NoOp,
            scanned,
            already_indexed,
            inserted: Vec::new(),
            duplicates: Vec::new(),
            skipped,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.outcome == IndexOutcome::NoOp
    }

    /// One-line count summary
    pub fn summary(&self) -> String {
        format!(
            "{} scanned, {} already indexed, {} inserted, {} duplicate, {} skipped",
            self.scanned,
            self.already_indexed,
            self.inserted.len(),
            self.duplicates.len(),
            self.skipped.len()
        )
    }
}

/// Brings a store in sync with a source
pub struct Indexer {
    engine: Arc<VectorEngine>,
    store: Arc<dyn VectorStore>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(engine: Arc<VectorEngine>, store: Arc<dyn VectorStore>) -> Self {
        Self::with_config(engine, store, IndexerConfig::default())
    }

    pub fn with_config(
        engine: Arc<VectorEngine>,
        store: Arc<dyn VectorStore>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
        }
    }

    /// Index every item of `source` not yet in the store
    ///
    /// # Errors
    /// `IndexingFailed` when the provider rejects a whole batch; entries from
    /// earlier batches of the same run stay committed. Scan and store errors
    /// propagate unchanged.
    pub fn run(&self, source: &dyn ItemSource) -> Result<IndexReport> {
        let scan = source.scan()?;
        for skipped in &scan.skipped {
            log::warn!(
                "Skipping {}: {}",
                skipped.path.display(),
                skipped.detail
            );
        }

        let existing = self.store.list_ids()?;
        let (known, new_items): (Vec<SourceItem>, Vec<SourceItem>) = scan
            .items
            .into_iter()
            .partition(|item| existing.contains(&item.id));

        let mut report = IndexReport::new(known.len() + new_items.len(), known.len(), scan.skipped);

        if new_items.is_empty() {
            log::info!("No new images to index ({} already indexed)", known.len());
            return Ok(report);
        }

        report.outcome = IndexOutcome::Indexed;
        log::info!("Indexing {} new images", new_items.len());

        let batch_size = self.config.batch_size.max(1);
        for batch in new_items.chunks(batch_size) {
            self.index_batch(source, batch, &mut report)?;
        }

        log::info!("Indexing finished: {}", report.summary());
        Ok(report)
    }

    fn index_batch(
        &self,
        source: &dyn ItemSource,
        batch: &[SourceItem],
        report: &mut IndexReport,
    ) -> Result<()> {
        let mut inputs = Vec::with_capacity(batch.len());
        let mut filenames = Vec::with_capacity(batch.len());

        for item in batch {
            match source.read(item) {
                Ok(bytes) => {
                    inputs.push(ImageInput {
                        id: item.id.clone(),
                        path: item.path.clone(),
                        bytes,
                    });
                    filenames.push(item.filename.clone());
                }
                Err(e) => {
                    log::warn!("Error loading {}: {}", item.filename, e);
                    report
                        .skipped
                        .push(SkippedItem::new(&item.path, SkipReason::SourceRead, e));
                }
            }
        }

        if inputs.is_empty() {
            return Ok(());
        }

        let outcomes = self
            .engine
            .embed_images(&inputs)
            .map_err(|e| LensError::IndexingFailed {
                reason: e.to_string(),
                inserted: report.inserted.len(),
            })?;

        let mut entries = Vec::with_capacity(inputs.len());
        for ((input, filename), outcome) in inputs.into_iter().zip(filenames).zip(outcomes) {
            match outcome {
                Ok(embedding) => entries.push(
                    IndexEntry::new(input.id, embedding).with_metadata(FILENAME_KEY, filename),
                ),
                Err(e) => {
                    log::warn!("Could not embed {}: {}", filename, e);
                    report
                        .skipped
                        .push(SkippedItem::new(input.path, SkipReason::Embedding, e));
                }
            }
        }

        if entries.is_empty() {
            return Ok(());
        }

        let inserted = self.store.insert(entries)?;
        if !inserted.duplicates.is_empty() {
            log::info!(
                "{} images were indexed concurrently by another run",
                inserted.duplicates.len()
            );
        }
        report.inserted.extend(inserted.inserted);
        report.duplicates.extend(inserted.duplicates);
        Ok(())
    }
}
