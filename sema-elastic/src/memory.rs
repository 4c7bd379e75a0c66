//! In-memory search backend.
//!
//! A complete implementation of the [`SearchBackend`] contract backed by a
//! mutex-guarded map, used across the workspace's tests. The `search`
//! operation evaluates `match_all`, `match`, and `term` queries, which is
//! enough to assert on indexed state.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::backend::SearchBackend;
use crate::error::{Result, SearchEngineError};

#[derive(Debug, Default, Clone)]
struct IndexState {
    mappings: Option<JsonValue>,
    settings: Option<JsonValue>,
    // BTreeMap keeps hit order deterministic for assertions
    docs: BTreeMap<String, JsonValue>,
}

/// In-memory search engine.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<HashMap<String, IndexState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in an index (test helper).
    pub fn doc_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .expect("memory backend poisoned")
            .get(name)
            .map(|state| state.docs.len())
            .unwrap_or(0)
    }

    /// Fetch one document by id (test helper).
    pub fn document(&self, name: &str, id: &str) -> Option<JsonValue> {
        self.inner
            .lock()
            .expect("memory backend poisoned")
            .get(name)
            .and_then(|state| state.docs.get(id).cloned())
    }

    /// All index names currently present (test helper).
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .expect("memory backend poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn with_index<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut IndexState) -> T,
    ) -> Result<T> {
        let mut inner = self.inner.lock().expect("memory backend poisoned");
        match inner.get_mut(name) {
            Some(state) => Ok(f(state)),
            None => Err(SearchEngineError::IndexMissing(name.to_string())),
        }
    }
}

/// Whether a stored field value matches a queried value: equal scalars, or
/// an array containing the queried value.
fn field_matches(field: &JsonValue, wanted: &JsonValue) -> bool {
    if field == wanted {
        return true;
    }
    match field {
        JsonValue::Array(items) => items.iter().any(|item| field_matches(item, wanted)),
        _ => false,
    }
}

fn doc_matches(doc: &JsonValue, query: &JsonValue) -> bool {
    if query.get("match_all").is_some() {
        return true;
    }
    for key in ["match", "term"] {
        if let Some(clause) = query.get(key).and_then(|c| c.as_object()) {
            return clause.iter().all(|(field, wanted)| {
                doc.get(field)
                    .map(|value| field_matches(value, wanted))
                    .unwrap_or(false)
            });
        }
    }
    false
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .expect("memory backend poisoned")
            .contains_key(name))
    }

    async fn create_index(
        &self,
        name: &str,
        mappings: Option<&JsonValue>,
        settings: Option<&JsonValue>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory backend poisoned");
        inner.entry(name.to_string()).or_insert_with(|| IndexState {
            mappings: mappings.cloned(),
            settings: settings.cloned(),
            docs: BTreeMap::new(),
        });
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("memory backend poisoned")
            .remove(name);
        Ok(())
    }

    async fn clear_index(&self, name: &str) -> Result<()> {
        self.with_index(name, |state| state.docs.clear())
    }

    async fn refresh_index(&self, name: &str) -> Result<()> {
        // Writes are immediately visible; refresh only checks existence.
        self.with_index(name, |_| ())
    }

    async fn upsert_document(&self, name: &str, id: &str, body: JsonValue) -> Result<()> {
        self.with_index(name, |state| {
            state.docs.insert(id.to_string(), body);
        })
    }

    async fn delete_document(&self, name: &str, id: &str) -> Result<()> {
        // Missing id is not an error; neither is a missing index here,
        // mirroring the tolerated delete-after-remove race.
        let mut inner = self.inner.lock().expect("memory backend poisoned");
        if let Some(state) = inner.get_mut(name) {
            state.docs.remove(id);
        }
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, docs: Vec<(String, JsonValue)>) -> Result<()> {
        self.with_index(name, |state| {
            for (id, doc) in docs {
                state.docs.insert(id, doc);
            }
        })
    }

    async fn search(&self, name: &str, body: JsonValue) -> Result<JsonValue> {
        let query = body.get("query").cloned().unwrap_or(json!({"match_all": {}}));
        self.with_index(name, |state| {
            let hits: Vec<JsonValue> = state
                .docs
                .iter()
                .filter(|(_, doc)| doc_matches(doc, &query))
                .map(|(id, doc)| json!({ "_id": id, "_source": doc }))
                .collect();
            json!({
                "hits": {
                    "total": { "value": hits.len() },
                    "hits": hits
                }
            })
        })
    }
}
