//! Error types for history stores.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Cannot access history at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt history entry at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode history entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No default history location on this platform")]
    NoDefaultLocation,
}
