//! Command output
//!
//! Human-readable text by default, one JSON document with `--json`.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use smartlens_index::{IndexReport, SkipReason};

use crate::error::CliResult;
use crate::session::{FoundImage, SessionStats};

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: &'a [FoundImage],
}

pub fn index_report(
    out: &mut impl Write,
    format: OutputFormat,
    images_dir: &Path,
    report: &IndexReport,
) -> CliResult<()> {
    if format == OutputFormat::Json {
        return json(out, report);
    }

    if report.scanned == 0 && report.skipped.is_empty() {
        writeln!(
            out,
            "No images found in {}. Please add some photos!",
            images_dir.display()
        )?;
        return Ok(());
    }

    if report.is_noop() {
        writeln!(out, "No new images to index.")?;
    } else {
        writeln!(out, "Indexed {} new images.", report.inserted.len())?;
    }
    writeln!(out, "{}", report.summary())?;

    for skipped in &report.skipped {
        let reason = match skipped.reason {
            SkipReason::SourceRead => "unreadable",
            SkipReason::Embedding => "not embeddable",
            SkipReason::DuplicateContent => "duplicate",
        };
        writeln!(out, "  skipped {} ({}): {}", skipped.path.display(), reason, skipped.detail)?;
    }
    Ok(())
}

pub fn search_results(
    out: &mut impl Write,
    format: OutputFormat,
    query: &str,
    hits: &[FoundImage],
) -> CliResult<()> {
    if format == OutputFormat::Json {
        return json(out, &SearchOutput { query, results: hits });
    }

    if hits.is_empty() {
        writeln!(out, "No matching images found.")?;
        return Ok(());
    }

    writeln!(out, "Top {} results for {:?}:", hits.len(), query)?;
    for (rank, found) in hits.iter().enumerate() {
        let hit = &found.hit;
        writeln!(out, "{:>3}. {}  (distance {:.4})", rank + 1, hit.filename, hit.distance)?;
        if !found.exists {
            writeln!(out, "     Image {} not found on disk.", hit.filename)?;
        }
    }
    Ok(())
}

pub fn stats(out: &mut impl Write, format: OutputFormat, stats: &SessionStats) -> CliResult<()> {
    if format == OutputFormat::Json {
        return json(out, stats);
    }

    let store = &stats.store;
    writeln!(out, "Images indexed:   {}", store.total_entries)?;
    writeln!(out, "Images in folder: {} ({})", stats.folder_images, stats.images_dir.display())?;
    writeln!(out, "Model:            {} ({}d)", store.model_id, store.dimension)?;
    if let Some(cached) = stats.model_cached {
        writeln!(out, "Model cached:     {}", if cached { "yes" } else { "no" })?;
    }
    writeln!(out, "Metric:           {}", store.metric)?;
    writeln!(out, "Store:            {}", stats.store_path.display())?;
    writeln!(out, "Created:          {}", stats.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    Ok(())
}

fn json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use smartlens_index::{DistanceMetric, IndexOutcome, ResolvedHit, StoreStats};
    use std::path::PathBuf;

    fn found(filename: &str, distance: f32, exists: bool) -> FoundImage {
        FoundImage {
            hit: ResolvedHit {
                id: filename.into(),
                filename: filename.into(),
                distance,
            },
            path: PathBuf::from("images").join(filename),
            exists,
        }
    }

    fn hits() -> Vec<FoundImage> {
        vec![found("dog.jpg", 0.12, true), found("cat.jpg", 0.5, true)]
    }

    fn session_stats() -> SessionStats {
        SessionStats {
            store: StoreStats {
                total_entries: 4,
                metric: DistanceMetric::Cosine,
                model_id: "clip-ViT-B-32".into(),
                dimension: 512,
            },
            folder_images: 6,
            images_dir: PathBuf::from("images"),
            store_path: PathBuf::from("/data/smartlens_db"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            model_cached: Some(true),
        }
    }

    fn report(scanned: usize, inserted: &[&str]) -> IndexReport {
        IndexReport {
            outcome: if inserted.is_empty() {
                IndexOutcome::NoOp
            } else {
                IndexOutcome::Indexed
            },
            scanned,
            already_indexed: scanned - inserted.len(),
            inserted: inserted.iter().map(|id| (*id).into()).collect(),
            duplicates: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> CliResult<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_search_text() {
        let text = render(|out| search_results(out, OutputFormat::Text, "a dog", &hits()));
        assert!(text.starts_with("Top 2 results for \"a dog\":"));
        assert!(text.contains("  1. dog.jpg  (distance 0.1200)"));
        assert!(text.contains("  2. cat.jpg"));
    }

    #[test]
    fn test_search_text_empty() {
        let text = render(|out| search_results(out, OutputFormat::Text, "a dog", &[]));
        assert_eq!(text, "No matching images found.\n");
    }

    #[test]
    fn test_search_text_warns_missing_file() {
        let hits = vec![found("dog.jpg", 0.12, false), found("cat.jpg", 0.5, true)];
        let text = render(|out| search_results(out, OutputFormat::Text, "a dog", &hits));
        assert!(text.contains("Image dog.jpg not found on disk."));
        assert!(!text.contains("Image cat.jpg not found"));
    }

    #[test]
    fn test_search_json() {
        let text = render(|out| search_results(out, OutputFormat::Json, "a dog", &hits()));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["query"], "a dog");
        assert_eq!(value["results"][0]["filename"], "dog.jpg");
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"][0]["exists"], true);
    }

    #[test]
    fn test_index_text_empty_folder() {
        let text = render(|out| {
            index_report(out, OutputFormat::Text, Path::new("./images"), &report(0, &[]))
        });
        assert_eq!(text, "No images found in ./images. Please add some photos!\n");
    }

    #[test]
    fn test_index_text_counts() {
        let text = render(|out| {
            index_report(out, OutputFormat::Text, Path::new("./images"), &report(3, &["a.jpg"]))
        });
        assert!(text.starts_with("Indexed 1 new images.\n"));

        let text = render(|out| {
            index_report(out, OutputFormat::Text, Path::new("./images"), &report(3, &[]))
        });
        assert!(text.starts_with("No new images to index.\n"));
    }

    #[test]
    fn test_stats_text_shows_folder_and_store_counts() {
        let text = render(|out| super::stats(out, OutputFormat::Text, &session_stats()));
        assert!(text.contains("Images indexed:   4\n"));
        assert!(text.contains("Images in folder: 6 (images)\n"));
        assert!(text.contains("Model cached:     yes\n"));
        assert!(text.contains("Created:          2024-05-01 12:00:00 UTC\n"));
    }

    #[test]
    fn test_stats_json_uses_camel_case() {
        let text = render(|out| super::stats(out, OutputFormat::Json, &session_stats()));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["totalEntries"], 4);
        assert_eq!(value["modelId"], "clip-ViT-B-32");
        assert_eq!(value["folderImages"], 6);
        assert_eq!(value["modelCached"], true);
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(OutputFormat::from_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Text);
    }
}
