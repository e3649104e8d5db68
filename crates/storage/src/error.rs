//! Error types for storage operations.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur in the blob and metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Blob {hash} not found")]
    BlobNotFound { hash: String },

    #[error("Blob {hash} failed verification: stored content hashes to {actual}")]
    BlobCorrupt { hash: String, actual: String },

    #[error("Corrupt document at {path}: {message}")]
    CorruptDocument { path: String, message: String },

    #[error("JSON encode error: {0}")]
    JsonEncode(#[from] serde_json::Error),
}

impl StoreError {
    /// Build an [`StoreError::Io`] with path context.
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Build a [`StoreError::CorruptDocument`] with path context.
    pub(crate) fn corrupt(path: &Path, err: serde_json::Error) -> Self {
        StoreError::CorruptDocument {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
