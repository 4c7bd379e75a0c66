//! Error types for search-engine clients

use thiserror::Error;

/// Search-engine client errors
#[derive(Error, Debug)]
pub enum SearchEngineError {
    /// Network or protocol failure reaching the engine
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine rejected the request
    #[error("search engine rejected request ({status}): {body}")]
    Status { status: u16, body: String },

    /// The target index does not exist
    #[error("index not found: {0}")]
    IndexMissing(String),

    /// Response body had the wrong shape
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SearchEngineError {
    /// Whether this error is worth retrying at the caller's granularity.
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchEngineError::Transport(_))
    }
}

/// Result type for search-engine operations
pub type Result<T> = std::result::Result<T, SearchEngineError>;
