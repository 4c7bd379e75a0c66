//! In-memory index catalog keyed by (type, allowed-groups).

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use sema_config::{group_key, AllowedGroup};

/// Lifecycle state of one index.
///
/// ```text
///   invalid ──ensure──▶ invalid
///   invalid ──update──▶ updating ──success──▶ valid
///                                  └─fail──▶ invalid
///   valid   ──invalidate──▶ invalid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Contents cannot be trusted; a rebuild is required
    Invalid,
    /// A rebuild is in flight
    Updating,
    /// Reflects all jobs acknowledged before the last successful refresh
    Valid,
}

/// One Search-Engine index scoped to a type and an allowed-group set.
#[derive(Debug)]
pub struct SearchIndex {
    /// Catalog resource IRI
    pub uri: String,
    /// Deterministic Search-Engine index name
    pub name: String,
    /// The type this index serves
    pub type_name: String,
    /// Authorization-group set every document fetch runs under
    pub allowed_groups: Vec<AllowedGroup>,
    /// Groups recorded as actually exercised; never part of the identity
    pub used_groups: Vec<AllowedGroup>,

    status: RwLock<IndexStatus>,
    /// Serializes rebuilds; held across rebuild I/O
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl SearchIndex {
    pub fn new(
        uri: String,
        name: String,
        type_name: String,
        allowed_groups: Vec<AllowedGroup>,
        used_groups: Vec<AllowedGroup>,
        status: IndexStatus,
    ) -> Self {
        Self {
            uri,
            name,
            type_name,
            allowed_groups,
            used_groups,
            status: RwLock::new(status),
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> IndexStatus {
        *self.status.read().expect("index status poisoned")
    }

    pub fn set_status(&self, status: IndexStatus) {
        *self.status.write().expect("index status poisoned") = status;
    }

    /// Mark the index as no longer trustworthy.
    pub fn invalidate(&self) {
        self.set_status(IndexStatus::Invalid);
    }

    /// The rebuild mutex. Acquired for the whole of a rebuild; the registry
    /// mutex is never held at the same time.
    pub fn rebuild_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.rebuild_lock
    }

    /// Canonical group key of this index's allowed groups.
    pub fn group_key(&self) -> String {
        group_key(&self.allowed_groups)
    }
}

/// In-memory catalog of indexes: `type_name → group_key → index`.
///
/// The structural mutex guards the maps only and is never held across I/O;
/// per-index state has its own locks.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    inner: Mutex<HashMap<String, HashMap<String, std::sync::Arc<SearchIndex>>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the index for a type and group set.
    pub fn get(&self, type_name: &str, groups: &[AllowedGroup]) -> Option<std::sync::Arc<SearchIndex>> {
        let key = group_key(groups);
        self.inner
            .lock()
            .expect("index registry poisoned")
            .get(type_name)
            .and_then(|by_group| by_group.get(&key))
            .cloned()
    }

    /// Insert an index, returning the existing entry instead if one is
    /// already registered for the same key.
    pub fn insert(&self, index: std::sync::Arc<SearchIndex>) -> std::sync::Arc<SearchIndex> {
        let mut inner = self.inner.lock().expect("index registry poisoned");
        let by_group = inner.entry(index.type_name.clone()).or_default();
        by_group
            .entry(index.group_key())
            .or_insert_with(|| index.clone())
            .clone()
    }

    /// Remove and return the index for a type and group set.
    pub fn remove(&self, type_name: &str, groups: &[AllowedGroup]) -> Option<std::sync::Arc<SearchIndex>> {
        let key = group_key(groups);
        let mut inner = self.inner.lock().expect("index registry poisoned");
        let by_group = inner.get_mut(type_name)?;
        let removed = by_group.remove(&key);
        if by_group.is_empty() {
            inner.remove(type_name);
        }
        removed
    }

    /// All indexes currently registered for a type.
    pub fn indexes_for_type(&self, type_name: &str) -> Vec<std::sync::Arc<SearchIndex>> {
        self.inner
            .lock()
            .expect("index registry poisoned")
            .get(type_name)
            .map(|by_group| by_group.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All registered indexes.
    pub fn all(&self) -> Vec<std::sync::Arc<SearchIndex>> {
        self.inner
            .lock()
            .expect("index registry poisoned")
            .values()
            .flat_map(|by_group| by_group.values().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("index registry poisoned")
            .values()
            .map(|by_group| by_group.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
