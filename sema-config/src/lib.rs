//! Index configuration model for sema-search.
//!
//! This crate provides the typed view of index definitions that the rest of
//! the workspace consumes:
//!
//! - [`PropertyPath`] / [`PathStep`]: ordered forward/inverse predicate
//!   steps from a root resource to a value
//! - [`PropertyDefinition`]: tagged variant over simple, language-string,
//!   attachment, and nested (recursive) properties
//! - [`TypeDefinition`] / [`TypeConfig`]: per-type definitions with
//!   precomputed flattened paths and the matching API used by the delta
//!   router and document builder
//! - [`AllowedGroup`]: authorization-group descriptors with canonical
//!   (order-independent) keys and deterministic index naming
//! - [`SearchSettings`]: runtime knobs (rebuild parallelism, queue bounds,
//!   attachment paths, ...)
//!
//! Definitions live for the process lifetime; [`TypeConfig`] validates the
//! definition map once at construction and any error there is fatal.

pub mod error;
pub mod groups;
pub mod path;
pub mod settings;
pub mod types;

pub use error::{ConfigError, Result};
pub use groups::{canonical_groups, group_key, index_name, AllowedGroup};
pub use path::{PathStep, PropertyPath};
pub use settings::SearchSettings;
pub use types::{PropertyDefinition, TypeConfig, TypeDefinition};
