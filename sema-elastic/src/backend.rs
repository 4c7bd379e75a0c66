//! The search-backend trait.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::Result;

/// The narrow search-engine interface the indexing pipeline consumes.
///
/// Implementations must be safe to share across worker tasks.
#[async_trait]
pub trait SearchBackend: Send + Sync + fmt::Debug {
    /// Whether an index exists.
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create an index, optionally with mappings and settings blobs.
    async fn create_index(
        &self,
        name: &str,
        mappings: Option<&JsonValue>,
        settings: Option<&JsonValue>,
    ) -> Result<()>;

    /// Delete an index. Deleting a missing index is not an error.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Remove every document from an index, keeping the index itself.
    async fn clear_index(&self, name: &str) -> Result<()>;

    /// Make all pending writes visible to search.
    async fn refresh_index(&self, name: &str) -> Result<()>;

    /// Insert or replace one document by id.
    async fn upsert_document(&self, name: &str, id: &str, body: JsonValue) -> Result<()>;

    /// Delete one document by id. A missing id is not an error.
    async fn delete_document(&self, name: &str, id: &str) -> Result<()>;

    /// Insert or replace a batch of `(id, body)` documents.
    ///
    /// Per-document failures are logged by the implementation and do not
    /// fail the batch.
    async fn bulk_upsert(&self, name: &str, docs: Vec<(String, JsonValue)>) -> Result<()>;

    /// Run a search request body against an index.
    async fn search(&self, name: &str, body: JsonValue) -> Result<JsonValue>;
}
