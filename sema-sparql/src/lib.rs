//! Authorized SPARQL gateway for sema-search.
//!
//! The triplestore is reached through the [`Triplestore`] trait: scoped
//! calls propagate an authorization-group set on every request, sudo calls
//! bypass authorization for catalog maintenance. The shipped implementation
//! is [`HttpTriplestore`], SPARQL 1.1 Query/Update over HTTP.
//!
//! This crate also provides the SPARQL JSON results model, the typed
//! [`Literal`] coercion used by the document builder, and the term/path
//! escaping helpers shared with the delta router.
//!
//! No retries happen here; retry policy lives in callers.

pub mod client;
pub mod error;
pub mod results;
pub mod term;

pub use client::{AuthScope, HttpTriplestore, Triplestore};
pub use error::{Result, SparqlError};
pub use results::{BindingTerm, Literal, SparqlResults};
pub use term::{escape_literal, iri_ref, path_to_sparql, quoted_literal, sparql_term};
