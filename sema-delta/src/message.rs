//! Delta message types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{DeltaError, Result};

/// Kind of an RDF term in a delta triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TermKind {
    /// An IRI
    Uri,
    /// A literal value, optionally carrying a datatype or language tag
    Literal,
    /// A blank node
    Bnode,
    /// Any other term kind emitted by the change stream
    Other,
}

impl From<String> for TermKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "uri" => TermKind::Uri,
            "literal" => TermKind::Literal,
            "bnode" => TermKind::Bnode,
            _ => TermKind::Other,
        }
    }
}

impl From<TermKind> for String {
    fn from(kind: TermKind) -> Self {
        match kind {
            TermKind::Uri => "uri",
            TermKind::Literal => "literal",
            TermKind::Bnode => "bnode",
            TermKind::Other => "other",
        }
        .to_string()
    }
}

/// One RDF term of a delta triple.
///
/// Mirrors the wire shape `{"type": "...", "value": "...",
/// "datatype": "..."?, "xml:lang": "..."?}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// Term kind discriminator (`type` on the wire)
    #[serde(rename = "type")]
    pub kind: TermKind,

    /// Lexical value: the IRI for `uri` terms, the lexical form for literals
    pub value: String,

    /// Datatype IRI, literals only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,

    /// Language tag, literals only (`xml:lang` on the wire)
    #[serde(
        rename = "xml:lang",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lang: Option<String>,
}

impl Term {
    /// Construct a `uri` term.
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Uri,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Construct a plain `literal` term.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Construct a datatyped `literal` term.
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// Construct a language-tagged `literal` term.
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }

    /// Whether this term is an IRI.
    pub fn is_uri(&self) -> bool {
        self.kind == TermKind::Uri
    }

    /// Whether this term is a literal.
    pub fn is_literal(&self) -> bool {
        self.kind == TermKind::Literal
    }
}

/// One triple-level change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// One changeset: the triples inserted and deleted by a single mutation.
///
/// Missing `inserts`/`deletes` keys on the wire are treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    #[serde(default)]
    pub inserts: Vec<Triple>,

    #[serde(default)]
    pub deletes: Vec<Triple>,
}

impl Changeset {
    /// Whether this changeset carries no triples at all.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}

/// A full delta message: an ordered list of changesets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaMessage {
    pub changesets: Vec<Changeset>,
}

impl DeltaMessage {
    /// Parse a delta message from raw bytes.
    ///
    /// The outer payload must be a JSON array; anything else is rejected
    /// with [`DeltaError::NotAnArray`] so the caller can log and drop the
    /// message without touching any index state.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_array() {
            return Err(DeltaError::NotAnArray {
                got: json_type_name(&value),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Total number of triples across all changesets.
    pub fn triple_count(&self) -> usize {
        self.changesets
            .iter()
            .map(|c| c.inserts.len() + c.deletes.len())
            .sum()
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Deduplicate triples preserving first-occurrence order.
///
/// Changeset lists routinely repeat triples (one application-level write
/// can touch the same triple several times); each list is deduplicated
/// before routing.
pub fn dedup_triples(triples: &[Triple]) -> Vec<&Triple> {
    let mut seen = HashSet::new();
    triples.iter().filter(|t| seen.insert(*t)).collect()
}
