//! Error types for the SPARQL gateway

use thiserror::Error;

/// Gateway errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Network or protocol failure reaching the triplestore
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The triplestore rejected the query
    #[error("query rejected ({status}): {body}")]
    Query { status: u16, body: String },

    /// Missing or invalid authorization scope
    #[error("authorization error: {0}")]
    Auth(String),

    /// The response body was not valid SPARQL JSON results
    #[error("malformed results: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SparqlError {
    /// Whether this error is worth retrying at the caller's granularity.
    ///
    /// Only transport failures are transient; query rejections and
    /// authorization errors repeat deterministically.
    pub fn is_transient(&self) -> bool {
        matches!(self, SparqlError::Transport(_))
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, SparqlError>;
