//! Error types for the SmartLens command line.

use smartlens_index::LensError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Lens(#[from] LensError),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Session not initialized")]
    NotInitialized,

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Lens(LensError::InvalidQuery(_)) => 2,
            CliError::ConfigNotFound(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
