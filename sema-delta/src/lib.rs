//! Delta message wire format for sema-search.
//!
//! This crate provides the types for the triplestore change-stream payload:
//! an ordered JSON array of changesets, each carrying `inserts` and
//! `deletes` lists of RDF triples. Parsing is strict about the outer shape
//! (non-array payloads are rejected without side effects) and lenient about
//! unknown fields.
//!
//! # Example
//!
//! ```ignore
//! use sema_delta::DeltaMessage;
//!
//! let delta = DeltaMessage::from_slice(payload)?;
//! for changeset in &delta.changesets {
//!     // inserts are processed before deletes
//! }
//! ```

pub mod error;
pub mod message;

pub use error::{DeltaError, Result};
pub use message::{dedup_triples, Changeset, DeltaMessage, Term, TermKind, Triple};

/// Delta format version implemented by this crate.
pub const DELTA_VERSION: &str = "v0.0.1";
