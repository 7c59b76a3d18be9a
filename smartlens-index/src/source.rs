//! Source enumeration
//!
//! Lists candidate images and derives their ids. Anything wrong with an
//! individual file becomes a [`SkippedItem`], never an error for the scan.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;

use crate::config::SourceConfig;
use crate::error::{LensError, Result};
use crate::item::{IdPolicy, ItemId};

/// One enumerated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub id: ItemId,
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated
    pub filename: String,
}

/// Why an item was left out of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Could not be listed or read
    SourceRead,
    /// Provider could not decode or embed it
    Embedding,
    /// Same bytes as an earlier file under content-hash ids
    DuplicateContent,
}

/// Item excluded from a run, with the cause
#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedItem {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason, detail: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason,
            detail: detail.to_string(),
        }
    }
}

/// Result of enumerating a source
#[derive(Debug, Default)]
pub struct SourceScan {
    pub items: Vec<SourceItem>,
    pub skipped: Vec<SkippedItem>,
}

/// Enumerable collection of images
pub trait ItemSource: Send + Sync {
    /// List items in a stable order
    fn scan(&self) -> Result<SourceScan>;

    /// Raw bytes of one item
    fn read(&self, item: &SourceItem) -> Result<Vec<u8>>;
}

/// Image directory on the local filesystem
pub struct DirectorySource {
    root: PathBuf,
    matcher: GlobSet,
    recursive: bool,
    id_policy: IdPolicy,
}

impl DirectorySource {
    /// Build from configuration, creating the root directory if missing
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if !config.root.exists() {
            log::info!("Creating image directory: {}", config.root.display());
            fs::create_dir_all(&config.root)?;
        }

        Ok(Self {
            root: config.root.clone(),
            matcher: extension_matcher(&config.extensions)?,
            recursive: config.recursive,
            id_policy: config.id_policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` has an accepted extension
    pub fn accepts(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }

    fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>, skipped: &mut Vec<SkippedItem>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                skipped.push(SkippedItem::new(dir, SkipReason::SourceRead, e));
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    skipped.push(SkippedItem::new(dir, SkipReason::SourceRead, e));
                    continue;
                }
            };

            let path = entry.path();
            let hidden = entry.file_name().to_str().is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }

            match entry.file_type() {
                Ok(ft) if ft.is_dir() => {
                    if self.recursive {
                        self.walk(&path, files, skipped);
                    }
                }
                Ok(_) => {
                    if self.accepts(&path) {
                        files.push(path);
                    }
                }
                Err(e) => skipped.push(SkippedItem::new(path, SkipReason::SourceRead, e)),
            }
        }
    }

    fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        ItemId::from_relative_path(relative).map(|id| id.as_str().to_string())
    }
}

impl ItemSource for DirectorySource {
    fn scan(&self) -> Result<SourceScan> {
        let mut files = Vec::new();
        let mut scan = SourceScan::default();

        if !self.root.is_dir() {
            return Err(LensError::invalid_path(format!(
                "Image source is not a directory: {}",
                self.root.display()
            )));
        }
        self.walk(&self.root, &mut files, &mut scan.skipped);
        files.sort();

        let mut seen_content: HashMap<ItemId, String> = HashMap::new();

        for path in files {
            let Some(filename) = self.relative_name(&path) else {
                scan.skipped.push(SkippedItem::new(
                    path,
                    SkipReason::SourceRead,
                    "file name is not valid UTF-8",
                ));
                continue;
            };

            let id = match self.id_policy {
                IdPolicy::FileName => ItemId::new(filename.clone()),
                IdPolicy::ContentHash => match fs::read(&path) {
                    Ok(bytes) => ItemId::from_content(&bytes),
                    Err(e) => {
                        scan.skipped.push(SkippedItem::new(path, SkipReason::SourceRead, e));
                        continue;
                    }
                },
            };

            if self.id_policy == IdPolicy::ContentHash {
                if let Some(first) = seen_content.get(&id) {
                    scan.skipped.push(SkippedItem::new(
                        path,
                        SkipReason::DuplicateContent,
                        format!("same content as {}", first),
                    ));
                    continue;
                }
                seen_content.insert(id.clone(), filename.clone());
            }

            scan.items.push(SourceItem { id, path, filename });
        }

        Ok(scan)
    }

    fn read(&self, item: &SourceItem) -> Result<Vec<u8>> {
        fs::read(&item.path).map_err(|e| LensError::source_read(&item.path, e))
    }
}

/// Case-insensitive `*.{ext,...}` matcher
fn extension_matcher(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = ext.trim_start_matches('.');
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| LensError::other(format!("Invalid extension {:?}: {}", ext, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| LensError::other(format!("Invalid extension set: {}", e)))
}
