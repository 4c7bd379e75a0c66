//! Pipeline facade wiring the router, queue, workers, and manager.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use sema_config::{SearchSettings, TypeConfig};
use sema_delta::DeltaMessage;
use sema_elastic::SearchBackend;
use sema_sparql::Triplestore;

use crate::builder::DocumentBuilder;
use crate::error::Result;
use crate::extract::TextExtractor;
use crate::handler::UpdateHandler;
use crate::manager::IndexManager;
use crate::queue::UpdateQueue;
use crate::router::DeltaRouter;

/// The delta-driven index maintenance pipeline.
///
/// Delta ingestion ([`handle_delta`]) runs on the caller's task and blocks
/// on the queue when it is full; workers run on their own tasks, so
/// backpressure never deadlocks. Call [`start`] once before feeding deltas
/// and [`shutdown`] to drain and stop.
///
/// [`handle_delta`]: SearchPipeline::handle_delta
/// [`start`]: SearchPipeline::start
/// [`shutdown`]: SearchPipeline::shutdown
pub struct SearchPipeline {
    manager: Arc<IndexManager>,
    handler: Arc<UpdateHandler>,
    router: DeltaRouter,
    queue: Arc<UpdateQueue>,
    settings: Arc<SearchSettings>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SearchPipeline {
    pub fn new(
        config: TypeConfig,
        settings: SearchSettings,
        store: Arc<dyn Triplestore>,
        engine: Arc<dyn SearchBackend>,
        extractor: Option<Arc<dyn TextExtractor>>,
    ) -> Self {
        let config = Arc::new(config);
        let settings = Arc::new(settings);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let builder = Arc::new(DocumentBuilder::new(
            store.clone(),
            config.clone(),
            settings.clone(),
            extractor,
        ));
        let manager = Arc::new(IndexManager::new(
            store.clone(),
            engine.clone(),
            config.clone(),
            settings.clone(),
            builder.clone(),
            shutdown_rx,
        ));
        let queue = Arc::new(UpdateQueue::new(settings.update_queue_capacity));
        let handler = Arc::new(UpdateHandler::new(
            queue.clone(),
            manager.clone(),
            builder,
            engine,
            store.clone(),
            config.clone(),
            settings.clone(),
        ));
        let router = DeltaRouter::new(config, store);

        Self {
            manager,
            handler,
            router,
            queue,
            settings,
            workers: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Spawn the worker pool and run startup initialization (catalog
    /// load-or-wipe plus eager index builds).
    pub async fn start(&self) -> Result<()> {
        {
            let mut workers = self.workers.lock().expect("worker handles poisoned");
            if workers.is_empty() {
                *workers = self.handler.clone().spawn();
            }
        }
        self.manager.initialize().await
    }

    /// Ingest one delta payload: parse, route, and enqueue the resulting
    /// jobs.
    ///
    /// A non-array payload is rejected with an error log and no state
    /// change. Blocks while the queue is full.
    pub async fn handle_delta(&self, payload: &[u8]) -> Result<usize> {
        let delta = match DeltaMessage::from_slice(payload) {
            Ok(delta) => delta,
            Err(e) => {
                tracing::error!(error = %e, "rejecting delta payload");
                return Err(e.into());
            }
        };

        let jobs = self.router.route(&delta).await?;
        let count = jobs.len();
        for job in jobs {
            self.queue.push(job).await?;
        }
        Ok(count)
    }

    /// The index manager, for catalog operations and tests.
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Pending jobs currently queued.
    pub async fn queued_jobs(&self) -> usize {
        self.queue.len().await
    }

    /// Signal shutdown, close the queue, and drain best-effort within the
    /// configured grace period. Workers still running after the grace
    /// period are aborted; an in-flight rebuild interrupted this way leaves
    /// its index invalid.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.queue.close().await;

        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().expect("worker handles poisoned");
            guard.drain(..).collect()
        };
        if workers.is_empty() {
            return;
        }

        let aborts: Vec<_> = workers.iter().map(|handle| handle.abort_handle()).collect();
        let drain = futures::future::join_all(workers);
        if tokio::time::timeout(self.settings.shutdown_grace, drain)
            .await
            .is_err()
        {
            tracing::warn!("shutdown grace period elapsed, aborting workers");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

impl std::fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("manager", &self.manager)
            .finish()
    }
}
