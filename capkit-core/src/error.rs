//! Error types for capkit-core.

use thiserror::Error;

/// All errors that can arise while shaping or decoding workspace documents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON encode/decode failure for a module or profile payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored document did not have the shape its module expects.
    #[error("invalid document at {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    /// A module name that is not one of the nine workspace modules.
    #[error("unknown module '{0}'; expected one of: canvas, personas, marketResearch, copywriting, mindset, productDesign, economics, sales, grow")]
    UnknownModule(String),
}
