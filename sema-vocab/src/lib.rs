//! RDF Vocabulary Constants for sema-search
//!
//! This crate provides a centralized location for the RDF vocabulary IRIs
//! and namespace constants used throughout the sema-search workspace.
//!
//! # Organization
//!
//! Constants are organized by vocabulary:
//! - `rdf` - RDF vocabulary (http://www.w3.org/1999/02/22-rdf-syntax-ns#)
//! - `xsd` - XSD vocabulary (http://www.w3.org/2001/XMLSchema#)
//! - `mu` - mu core vocabulary (resource uuids)
//! - `auth` - index catalog vocabulary and the authorization graph
//! - `share` - the attachment file IRI scheme

/// RDF vocabulary constants
pub mod rdf {
    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    /// rdf:langString IRI
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

/// XSD vocabulary constants
pub mod xsd {
    /// xsd:string IRI
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

    /// xsd:integer IRI
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

    /// xsd:long IRI
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";

    /// xsd:int IRI
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";

    /// xsd:short IRI
    pub const SHORT: &str = "http://www.w3.org/2001/XMLSchema#short";

    /// xsd:decimal IRI
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

    /// xsd:double IRI
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

    /// xsd:float IRI
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";

    /// xsd:boolean IRI
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

    /// xsd:date IRI
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";

    /// xsd:dateTime IRI
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

    /// xsd:time IRI
    pub const TIME: &str = "http://www.w3.org/2001/XMLSchema#time";
}

/// mu core vocabulary constants
pub mod mu {
    /// mu:uuid IRI - the resource uuid predicate, indexed by default on
    /// every document under the `uuid` field
    pub const UUID: &str = "http://mu.semte.ch/vocabularies/core/uuid";
}

/// Index catalog vocabulary
///
/// Persisted index records live in the authorization graph as
/// `auth:ElasticsearchIndex` resources carrying the object type, the
/// deterministic index name, and JSON-encoded group descriptors.
pub mod auth {
    /// The graph holding persisted index records
    pub const GRAPH: &str = "http://mu.semte.ch/authorization";

    /// Class of a persisted index record
    pub const ELASTICSEARCH_INDEX: &str =
        "http://mu.semte.ch/vocabularies/search/ElasticsearchIndex";

    /// The type_name an index serves
    pub const OBJECT_TYPE: &str = "http://mu.semte.ch/vocabularies/search/objectType";

    /// The deterministic Search-Engine index name
    pub const INDEX_NAME: &str = "http://mu.semte.ch/vocabularies/search/indexName";

    /// A JSON-encoded allowed-group descriptor
    pub const HAS_ALLOWED_GROUP: &str = "http://mu.semte.ch/vocabularies/search/hasAllowedGroup";

    /// A JSON-encoded used-group descriptor
    pub const HAS_USED_GROUP: &str = "http://mu.semte.ch/vocabularies/search/hasUsedGroup";
}

/// Attachment file IRI scheme
pub mod share {
    /// Scheme prefix stripped from file IRIs when resolving them to
    /// filesystem paths under the attachment base directory
    pub const SCHEME: &str = "share://";
}
