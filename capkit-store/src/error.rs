//! Error types for capkit-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors a document store can report, on reads, writes or in a
/// subscription stream.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller may not read or write this document.
    #[error("permission denied for {path}")]
    PermissionDenied { path: String },

    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document path that cannot be mapped onto the store.
    #[error("invalid document path '{0}'")]
    InvalidPath(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored file that is not a JSON object.
    #[error("failed to parse document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error on the write path.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem watcher failure.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
