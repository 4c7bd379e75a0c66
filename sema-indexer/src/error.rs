//! Error types for the indexing pipeline

use thiserror::Error;

/// Indexing pipeline errors
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Invalid configuration, fatal at startup
    #[error("configuration error: {0}")]
    Config(#[from] sema_config::ConfigError),

    /// Triplestore gateway failure
    #[error("triplestore error: {0}")]
    Sparql(#[from] sema_sparql::SparqlError),

    /// Search-engine failure
    #[error("search engine error: {0}")]
    SearchEngine(#[from] sema_elastic::SearchEngineError),

    /// Malformed delta payload
    #[error("delta error: {0}")]
    Delta(#[from] sema_delta::DeltaError),

    /// Incompatible values while merging composite sub-documents
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// No type definition for the requested type name
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The pipeline is shutting down
    #[error("pipeline is shutting down")]
    Shutdown,
}

impl IndexerError {
    /// Whether the underlying failure is a transient transport error worth
    /// retrying at job granularity.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::Sparql(e) => e.is_transient(),
            IndexerError::SearchEngine(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, IndexerError>;
