//! Error types for delta message parsing

use thiserror::Error;

/// Delta parsing errors
#[derive(Error, Debug)]
pub enum DeltaError {
    /// Payload was valid JSON but not an array of changesets
    #[error("delta payload is not a JSON array (got {got})")]
    NotAnArray {
        /// JSON type of the rejected payload
        got: &'static str,
    },

    /// Payload was not valid JSON, or a changeset had the wrong shape
    #[error("malformed delta payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for delta operations
pub type Result<T> = std::result::Result<T, DeltaError>;
