//! Runtime settings for the indexing pipeline.

use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::time::Duration;

use crate::groups::AllowedGroup;

/// Configuration for the indexing pipeline.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Retain the index catalog in the triplestore across restarts.
    ///
    /// When false, `initialize` wipes every persisted index from the
    /// triplestore and the Search Engine instead of loading them.
    /// Default: false
    pub persist_indexes: bool,

    /// Build one index per allowed-group element instead of one per full
    /// group set.
    /// Default: false
    pub additive_indexes: bool,

    /// Allowed-group sets to ensure and rebuild at startup, crossed with
    /// every configured type.
    pub eager_indexing_groups: Vec<Vec<AllowedGroup>>,

    /// Update-handler worker count, also the rebuild document-build
    /// concurrency.
    /// Default: 2
    pub number_of_threads: usize,

    /// Resources fetched and upserted per rebuild batch.
    /// Default: 128
    pub batch_size: usize,

    /// Upper bound on rebuild batches per index; `None` means unbounded.
    /// Default: None
    pub max_batches: Option<usize>,

    /// Capacity of the coalescing update queue. Delta ingestion blocks on
    /// enqueue when the queue is full.
    /// Default: 1000
    pub update_queue_capacity: usize,

    /// Transport-error retries per update job before the index is marked
    /// invalid.
    /// Default: 3
    pub update_retries: u32,

    /// Initial retry backoff delay.
    /// Default: 250ms
    pub update_retry_initial: Duration,

    /// Maximum retry backoff delay.
    /// Default: 5s
    pub update_retry_max: Duration,

    /// Base directory for attachment files; file IRIs resolve beneath it.
    /// Default: `/share`
    pub attachment_path_base: PathBuf,

    /// Directory for the extraction cache, one file per content hash.
    /// Default: `/cache`
    pub extraction_cache_base: PathBuf,

    /// Attachments larger than this many bytes are not extracted; their
    /// content field is null.
    /// Default: 100 MB
    pub maximum_file_size: u64,

    /// Search-Engine settings applied when a type definition carries none.
    pub default_index_settings: Option<JsonValue>,

    /// Grace period for the best-effort queue drain on shutdown.
    /// Default: 30s
    pub shutdown_grace: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            persist_indexes: false,
            additive_indexes: false,
            eager_indexing_groups: Vec::new(),
            number_of_threads: 2,
            batch_size: 128,
            max_batches: None,
            update_queue_capacity: 1000,
            update_retries: 3,
            update_retry_initial: Duration::from_millis(250),
            update_retry_max: Duration::from_secs(5),
            attachment_path_base: PathBuf::from("/share"),
            extraction_cache_base: PathBuf::from("/cache"),
            maximum_file_size: 100 * 1024 * 1024,
            default_index_settings: None,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl SearchSettings {
    /// Builder method to retain the index catalog across restarts
    pub fn with_persist_indexes(mut self, persist: bool) -> Self {
        self.persist_indexes = persist;
        self
    }

    /// Builder method to enable additive (per-group) indexes
    pub fn with_additive_indexes(mut self, additive: bool) -> Self {
        self.additive_indexes = additive;
        self
    }

    /// Builder method to set the eager-init group sets
    pub fn with_eager_indexing_groups(mut self, groups: Vec<Vec<AllowedGroup>>) -> Self {
        self.eager_indexing_groups = groups;
        self
    }

    /// Builder method to set the worker count
    pub fn with_number_of_threads(mut self, threads: usize) -> Self {
        self.number_of_threads = threads.max(1);
        self
    }

    /// Builder method to set the rebuild batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builder method to cap rebuild batches per index
    pub fn with_max_batches(mut self, max_batches: Option<usize>) -> Self {
        self.max_batches = max_batches;
        self
    }

    /// Builder method to set the update queue capacity
    pub fn with_update_queue_capacity(mut self, capacity: usize) -> Self {
        self.update_queue_capacity = capacity.max(1);
        self
    }

    /// Builder method to set the retry policy for transport errors
    pub fn with_update_retries(mut self, retries: u32, initial: Duration, max: Duration) -> Self {
        self.update_retries = retries;
        self.update_retry_initial = initial;
        self.update_retry_max = max;
        self
    }

    /// Builder method to set the attachment base directory
    pub fn with_attachment_path_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.attachment_path_base = base.into();
        self
    }

    /// Builder method to set the extraction cache directory
    pub fn with_extraction_cache_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.extraction_cache_base = base.into();
        self
    }

    /// Builder method to set the maximum extractable file size
    pub fn with_maximum_file_size(mut self, bytes: u64) -> Self {
        self.maximum_file_size = bytes;
        self
    }

    /// Builder method to set default Search-Engine index settings
    pub fn with_default_index_settings(mut self, settings: JsonValue) -> Self {
        self.default_index_settings = Some(settings);
        self
    }

    /// Builder method to set the shutdown drain grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
