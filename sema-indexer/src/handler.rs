//! Update handler: worker pool applying queued jobs to the Search Engine.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use sema_config::{SearchSettings, TypeConfig};
use sema_elastic::SearchBackend;
use sema_sparql::{iri_ref, AuthScope, Triplestore};

use crate::builder::DocumentBuilder;
use crate::error::{IndexerError, Result};
use crate::manager::IndexManager;
use crate::queue::{UpdateJob, UpdateOp, UpdateQueue};
use crate::registry::SearchIndex;

/// Worker pool translating `(subject, type, op)` jobs into document builds
/// and Search-Engine writes.
///
/// Jobs for the same key arrive in order after coalescing; distinct keys
/// may be processed on any worker, so no cross-key ordering holds.
pub struct UpdateHandler {
    queue: Arc<UpdateQueue>,
    manager: Arc<IndexManager>,
    builder: Arc<DocumentBuilder>,
    engine: Arc<dyn SearchBackend>,
    store: Arc<dyn Triplestore>,
    config: Arc<TypeConfig>,
    settings: Arc<SearchSettings>,
}

impl UpdateHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<UpdateQueue>,
        manager: Arc<IndexManager>,
        builder: Arc<DocumentBuilder>,
        engine: Arc<dyn SearchBackend>,
        store: Arc<dyn Triplestore>,
        config: Arc<TypeConfig>,
        settings: Arc<SearchSettings>,
    ) -> Self {
        Self {
            queue,
            manager,
            builder,
            engine,
            store,
            config,
            settings,
        }
    }

    /// Spawn the configured number of workers. Each worker runs until the
    /// queue is closed and drained.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.settings.number_of_threads)
            .map(|worker_id| {
                let handler = self.clone();
                tokio::spawn(async move { handler.worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize) {
        tracing::debug!(worker_id, "update worker started");
        while let Some(job) = self.queue.pop().await {
            self.process_job(&job).await;
        }
        tracing::debug!(worker_id, "update worker stopped");
    }

    /// Apply one job to every index currently registered for its type.
    pub async fn process_job(&self, job: &UpdateJob) {
        let indexes = self.manager.registry().indexes_for_type(&job.type_name);
        if indexes.is_empty() {
            tracing::debug!(
                subject = %job.subject,
                type_name = %job.type_name,
                "no indexes registered for type, dropping job"
            );
            return;
        }
        for index in indexes {
            self.apply_with_retry(job, &index).await;
        }
    }

    async fn apply_with_retry(&self, job: &UpdateJob, index: &Arc<SearchIndex>) {
        let mut backoff = ExponentialBackoff::new(
            self.settings.update_retry_initial,
            self.settings.update_retry_max,
            2.0,
        );
        let mut attempts = 0u32;

        loop {
            match self.apply(job, index).await {
                Ok(()) => return,
                Err(e) if e.is_transient() && attempts < self.settings.update_retries => {
                    attempts += 1;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        subject = %job.subject,
                        index = %index.name,
                        attempt = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        "transient failure applying update, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    index.invalidate();
                    tracing::error!(
                        error = %e,
                        subject = %job.subject,
                        index = %index.name,
                        "retries exhausted, index marked invalid"
                    );
                    return;
                }
                Err(IndexerError::MergeConflict(msg)) => {
                    tracing::error!(
                        subject = %job.subject,
                        index = %index.name,
                        conflict = %msg,
                        "merge conflict, dropping document"
                    );
                    return;
                }
                Err(e) => {
                    // Query and authorization failures repeat
                    // deterministically: skip the job, leave the index
                    // status untouched.
                    tracing::warn!(
                        error = %e,
                        subject = %job.subject,
                        index = %index.name,
                        "skipping update job"
                    );
                    return;
                }
            }
        }
    }

    async fn apply(&self, job: &UpdateJob, index: &SearchIndex) -> Result<()> {
        let scope = AuthScope::groups(&index.allowed_groups);
        let types = self
            .config
            .related_rdf_types(&job.type_name)
            .iter()
            .map(|t| iri_ref(t))
            .collect::<Vec<_>>()
            .join(", ");
        let ask = format!(
            "ASK {{ {} a ?type . FILTER(?type IN ({types})) }}",
            iri_ref(&job.subject)
        );
        let exists = self.store.ask(&ask, &scope).await?;

        match job.op {
            UpdateOp::Update if exists => {
                let document = self
                    .builder
                    .build(&job.subject, &job.type_name, &index.allowed_groups)
                    .await?;
                self.engine
                    .upsert_document(&index.name, &job.subject, document)
                    .await?;
            }
            UpdateOp::Update => {
                // Not visible under this scope: an authorization boundary
                // or a deletion race. Nothing to write.
                tracing::debug!(
                    subject = %job.subject,
                    index = %index.name,
                    "subject not visible under index scope, skipping upsert"
                );
            }
            UpdateOp::Delete if exists => {
                // Still present under this scope; the document stands.
                tracing::debug!(
                    subject = %job.subject,
                    index = %index.name,
                    "subject still visible under index scope, keeping document"
                );
            }
            UpdateOp::Delete => {
                self.engine.delete_document(&index.name, &job.subject).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for UpdateHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHandler")
            .field("workers", &self.settings.number_of_threads)
            .finish()
    }
}

/// Exponential backoff with jitter (±25%).
struct ExponentialBackoff {
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            max,
            multiplier,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(
            self.max,
            Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier),
        );
        let jitter = rand::random::<f64>() * 0.5 - 0.25;
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
    }
}
