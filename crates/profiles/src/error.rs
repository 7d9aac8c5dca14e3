//! Profile error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or watching the profile table.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile table not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read profile table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to create profile watcher: {0}")]
    WatcherCreation(String),

    #[error("failed to watch {path}: {message}")]
    WatchPath { path: PathBuf, message: String },
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
