//! Authorization-group descriptors and deterministic index naming.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One authorization-group descriptor: a group name plus its variable
/// bindings. Serialized as JSON both in request headers and in catalog
/// literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllowedGroup {
    pub name: String,

    #[serde(default)]
    pub variables: Vec<String>,
}

impl AllowedGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variables(name: impl Into<String>, variables: Vec<String>) -> Self {
        Self {
            name: name.into(),
            variables,
        }
    }
}

/// Sort and deduplicate a group set into its canonical order.
///
/// Group sets are order-independent for identity; every serialization that
/// feeds a key or a hash goes through this.
pub fn canonical_groups(groups: &[AllowedGroup]) -> Vec<AllowedGroup> {
    let mut sorted = groups.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Canonical stringification of a group set, used as the map key within a
/// type.
pub fn group_key(groups: &[AllowedGroup]) -> String {
    let canonical = canonical_groups(groups);
    // Serializing Vec<AllowedGroup> cannot fail: no maps with non-string
    // keys, no non-finite floats.
    serde_json::to_string(&canonical).expect("group descriptors serialize infallibly")
}

/// Deterministic Search-Engine index name for `(type_name, groups)`.
///
/// A pure function of the type name and the canonical group serialization;
/// permutations of the same group set yield the same name. `used_groups`
/// deliberately do not participate.
pub fn index_name(type_name: &str, groups: &[AllowedGroup]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(type_name.as_bytes());
    hasher.update(group_key(groups).as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
