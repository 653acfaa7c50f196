use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bytes are not an image in a supported format.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An expected blob is absent from the blob store.
    #[error("Missing source blob: {0}")]
    MissingSource(String),

    /// A single blob store call failed.
    #[error("Blob store error at {path}: {message}")]
    Storage { path: String, message: String },

    /// The repository update failed after new blobs were written. The record
    /// still references its previous state and needs a re-run.
    #[error("Repository write failed: {0}")]
    RepositoryWrite(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn storage(path: impl Into<String>, message: impl ToString) -> Self {
        MediaError::Storage {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
