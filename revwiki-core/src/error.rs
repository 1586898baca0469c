//! Error types for the revision store.

use std::path::PathBuf;
use thiserror::Error;

/// Input rejected before any state is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Comment is too long: length {length} (max {max})")]
    CommentTooLong { length: usize, max: usize },
}

/// Failures of a persistence backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt document file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Persisted document {0:?} has no revisions")]
    EmptyDocument(String),
}

/// Errors returned by revision store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// True when the caller sent invalid input (as opposed to a storage fault)
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}
