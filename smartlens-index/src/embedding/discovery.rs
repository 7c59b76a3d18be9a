//! Model cache discovery
//!
//! Resolves where fastembed keeps the downloaded CLIP weights.

use crate::error::{LensError, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding every other models location
pub const MODELS_PATH_ENV: &str = "SMARTLENS_MODELS_PATH";

/// Prefix of the fastembed cache folders for CLIP ViT-B/32
const CLIP_CACHE_PREFIX: &str = "models--Qdrant--clip-ViT-B-32";

/// Resolve the models directory with priority:
/// 1. SMARTLENS_MODELS_PATH environment variable
/// 2. Configured directory
/// 3. User home directory (~/.smartlens/models)
///
/// The directory is created if missing.
pub fn resolve_models_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = if let Ok(models_path) = std::env::var(MODELS_PATH_ENV) {
        log::info!("Using {}: {}", MODELS_PATH_ENV, models_path);
        PathBuf::from(models_path)
    } else if let Some(dir) = configured {
        dir.to_path_buf()
    } else {
        home_models_dir()?
    };

    std::fs::create_dir_all(&dir).map_err(|e| {
        LensError::invalid_path(format!("Cannot create models dir {}: {}", dir.display(), e))
    })?;
    Ok(dir)
}

fn home_models_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .ok_or_else(|| LensError::model("Cannot determine home directory for model cache"))?;

    Ok(PathBuf::from(home).join(".smartlens").join("models"))
}

/// Whether CLIP weights were already downloaded into `dir`
pub fn is_model_cached(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(CLIP_CACHE_PREFIX))
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_model_cached_nonexistent() {
        assert!(!is_model_cached(Path::new("/nonexistent/path")));
    }

    #[test]
    fn test_is_model_cached_detects_fastembed_layout() {
        let dir = TempDir::new().unwrap();
        assert!(!is_model_cached(dir.path()));

        std::fs::create_dir(dir.path().join("models--Qdrant--clip-ViT-B-32-vision")).unwrap();
        assert!(is_model_cached(dir.path()));
    }

    #[test]
    fn test_resolve_configured_dir() {
        // Either the env override or the configured dir wins, both must exist afterwards
        let dir = TempDir::new().unwrap();
        let configured = dir.path().join("models");
        let resolved = resolve_models_dir(Some(&configured)).unwrap();
        assert!(resolved.exists());
        if std::env::var(MODELS_PATH_ENV).is_err() {
            assert_eq!(resolved, configured);
        }
    }
}
