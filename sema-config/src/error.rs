//! Error types for the configuration model

use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A composite type referenced a sibling type that does not exist
    #[error("composite type '{composite}' references unknown type '{member}'")]
    UnknownCompositeMember { composite: String, member: String },

    /// A composite type listed no members
    #[error("composite type '{0}' has an empty composite_types list")]
    EmptyComposite(String),

    /// A non-composite type declared no rdf_types
    #[error("type '{0}' declares no rdf_types")]
    EmptyRdfTypes(String),

    /// A composite member was itself composite
    #[error("composite type '{composite}' nests composite member '{member}'")]
    NestedComposite { composite: String, member: String },

    /// Definition JSON had the wrong shape
    #[error("malformed type definitions: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
