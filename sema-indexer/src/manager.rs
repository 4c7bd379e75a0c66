//! Index manager: creates, rebuilds, and removes indexes across the
//! registry, the triplestore catalog, and the Search Engine.

use futures::stream::{self, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

use sema_config::{canonical_groups, index_name, AllowedGroup, SearchSettings, TypeConfig};
use sema_elastic::SearchBackend;
use sema_sparql::{iri_ref, quoted_literal, AuthScope, Triplestore};
use sema_vocab::{auth, mu};

use crate::builder::DocumentBuilder;
use crate::error::{IndexerError, Result};
use crate::registry::{IndexRegistry, IndexStatus, SearchIndex};

/// Owns the index lifecycle: the in-memory registry, the persisted catalog,
/// and the Search-Engine indexes behind it.
pub struct IndexManager {
    registry: IndexRegistry,
    store: Arc<dyn Triplestore>,
    engine: Arc<dyn SearchBackend>,
    config: Arc<TypeConfig>,
    settings: Arc<SearchSettings>,
    builder: Arc<DocumentBuilder>,
    shutdown: watch::Receiver<bool>,
}

impl IndexManager {
    pub fn new(
        store: Arc<dyn Triplestore>,
        engine: Arc<dyn SearchBackend>,
        config: Arc<TypeConfig>,
        settings: Arc<SearchSettings>,
        builder: Arc<DocumentBuilder>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry: IndexRegistry::new(),
            store,
            engine,
            config,
            settings,
            builder,
            shutdown,
        }
    }

    /// The in-memory catalog.
    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Startup: load or wipe the persisted catalog, then build every eager
    /// `(groups × type)` index that is not yet valid.
    pub async fn initialize(&self) -> Result<()> {
        if self.settings.persist_indexes {
            self.load_catalog().await?;
        } else {
            self.wipe_persisted().await?;
        }

        let type_names: Vec<String> = self.config.type_names().map(|s| s.to_string()).collect();
        for groups in &self.settings.eager_indexing_groups {
            for type_name in &type_names {
                if *self.shutdown.borrow() {
                    return Err(IndexerError::Shutdown);
                }
                if let Err(e) = self.fetch_indexes_for(type_name, groups, &[]).await {
                    tracing::error!(
                        error = %e,
                        type_name,
                        "eager index initialization failed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Ensure the index for `(type_name, allowed_groups)` exists in the
    /// catalog row (when persisting), the registry, and the Search Engine.
    /// New registry entries start invalid.
    pub async fn ensure_index(
        &self,
        type_name: &str,
        allowed_groups: &[AllowedGroup],
        used_groups: &[AllowedGroup],
    ) -> Result<Arc<SearchIndex>> {
        let def = self
            .config
            .definition(type_name)
            .ok_or_else(|| IndexerError::UnknownType(type_name.to_string()))?;

        let name = index_name(type_name, allowed_groups);
        let allowed = canonical_groups(allowed_groups);
        let used = canonical_groups(used_groups);

        let index = match self.registry.get(type_name, &allowed) {
            Some(existing) => existing,
            None => {
                let uuid = uuid::Uuid::new_v4().to_string();
                let uri = format!("http://mu.semte.ch/vocabularies/search/indexes/{uuid}");
                let index = Arc::new(SearchIndex::new(
                    uri,
                    name.clone(),
                    type_name.to_string(),
                    allowed,
                    used,
                    IndexStatus::Invalid,
                ));
                if self.settings.persist_indexes {
                    self.ensure_catalog_row(&index, &uuid).await?;
                }
                self.registry.insert(index)
            }
        };

        if !self.engine.index_exists(&name).await? {
            let settings_blob = def
                .settings
                .as_ref()
                .or(self.settings.default_index_settings.as_ref());
            self.engine
                .create_index(&name, def.mappings.as_ref(), settings_blob)
                .await?;
        }

        Ok(index)
    }

    /// The indexes serving `(type_name, allowed_groups)`: one per singleton
    /// group when additive, one for the full set otherwise. Every returned
    /// index has either been refreshed to valid or is reported invalid
    /// after a failed rebuild.
    pub async fn fetch_indexes_for(
        &self,
        type_name: &str,
        allowed_groups: &[AllowedGroup],
        used_groups: &[AllowedGroup],
    ) -> Result<Vec<Arc<SearchIndex>>> {
        let group_sets: Vec<Vec<AllowedGroup>> = if self.settings.additive_indexes {
            canonical_groups(allowed_groups)
                .into_iter()
                .map(|group| vec![group])
                .collect()
        } else {
            vec![allowed_groups.to_vec()]
        };

        let mut indexes = Vec::with_capacity(group_sets.len());
        for groups in group_sets {
            let index = self.ensure_index(type_name, &groups, used_groups).await?;
            if index.status() != IndexStatus::Valid {
                if let Err(e) = self.update_index(&index).await {
                    tracing::error!(
                        error = %e,
                        index = %index.name,
                        type_name,
                        "index rebuild failed"
                    );
                }
            }
            indexes.push(index);
        }
        Ok(indexes)
    }

    /// Full rebuild under the per-index mutex.
    ///
    /// `invalid → updating → valid` on success; any failure leaves the
    /// index invalid. The registry mutex is never held here.
    pub async fn update_index(&self, index: &Arc<SearchIndex>) -> Result<()> {
        let _guard = index.rebuild_lock().lock().await;
        if index.status() == IndexStatus::Valid {
            // Another caller rebuilt while we waited for the lock.
            return Ok(());
        }

        index.set_status(IndexStatus::Updating);
        match self.rebuild(index).await {
            Ok(()) => {
                index.set_status(IndexStatus::Valid);
                tracing::info!(index = %index.name, type_name = %index.type_name, "index rebuilt");
                Ok(())
            }
            Err(e) => {
                index.invalidate();
                Err(e)
            }
        }
    }

    async fn rebuild(&self, index: &SearchIndex) -> Result<()> {
        self.engine.clear_index(&index.name).await?;

        let types = self
            .config
            .related_rdf_types(&index.type_name)
            .iter()
            .map(|t| iri_ref(t))
            .collect::<Vec<_>>()
            .join(", ");
        let scope = AuthScope::groups(&index.allowed_groups);
        let batch_size = self.settings.batch_size;

        let mut offset = 0usize;
        let mut batches = 0usize;
        loop {
            if *self.shutdown.borrow() {
                return Err(IndexerError::Shutdown);
            }

            let query = format!(
                "SELECT DISTINCT ?resource WHERE {{ ?resource a ?type . \
                 FILTER(?type IN ({types})) }} ORDER BY ?resource LIMIT {batch_size} OFFSET {offset}"
            );
            let results = self.store.select(&query, &scope).await?;
            let resources: Vec<String> = results
                .column("resource")
                .filter(|term| term.is_uri())
                .map(|term| term.value.clone())
                .collect();
            if resources.is_empty() {
                break;
            }
            let fetched = resources.len();

            // Build documents concurrently; a failed document is logged
            // and skipped, never aborting the rebuild.
            let built: Vec<Option<(String, JsonValue)>> = stream::iter(resources)
                .map(|resource| {
                    let builder = self.builder.clone();
                    let index_ref = index;
                    async move {
                        match builder
                            .build(&resource, &index_ref.type_name, &index_ref.allowed_groups)
                            .await
                        {
                            Ok(doc) => Some((resource, doc)),
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    resource = %resource,
                                    index = %index_ref.name,
                                    "skipping document during rebuild"
                                );
                                None
                            }
                        }
                    }
                })
                .buffer_unordered(self.settings.number_of_threads)
                .collect()
                .await;
            let docs: Vec<(String, JsonValue)> = built.into_iter().flatten().collect();
            self.engine.bulk_upsert(&index.name, docs).await?;

            batches += 1;
            if fetched < batch_size {
                break;
            }
            if let Some(max) = self.settings.max_batches {
                if batches >= max {
                    tracing::warn!(
                        index = %index.name,
                        batches,
                        "rebuild stopped at max_batches"
                    );
                    break;
                }
            }
            offset += batch_size;
        }

        self.engine.refresh_index(&index.name).await?;
        Ok(())
    }

    /// Remove the index from the registry, the Search Engine, and (when
    /// persisting) the catalog.
    pub async fn remove_index(
        &self,
        type_name: &str,
        allowed_groups: &[AllowedGroup],
    ) -> Result<()> {
        let Some(index) = self.registry.remove(type_name, allowed_groups) else {
            return Ok(());
        };
        self.engine.delete_index(&index.name).await?;
        if self.settings.persist_indexes {
            self.delete_catalog_row(&index.name).await?;
        }
        Ok(())
    }

    // --- catalog persistence -------------------------------------------

    async fn ensure_catalog_row(&self, index: &SearchIndex, uuid: &str) -> Result<()> {
        let exists = format!(
            "ASK {{ GRAPH {} {{ ?index {} {} }} }}",
            iri_ref(auth::GRAPH),
            iri_ref(auth::INDEX_NAME),
            quoted_literal(&index.name, None, None)
        );
        if self.store.ask(&exists, &AuthScope::Sudo).await? {
            return Ok(());
        }

        let subject = iri_ref(&index.uri);
        let mut triples = vec![
            format!("{subject} a {}", iri_ref(auth::ELASTICSEARCH_INDEX)),
            format!(
                "{subject} {} {}",
                iri_ref(mu::UUID),
                quoted_literal(uuid, None, None)
            ),
            format!(
                "{subject} {} {}",
                iri_ref(auth::OBJECT_TYPE),
                quoted_literal(&index.type_name, None, None)
            ),
            format!(
                "{subject} {} {}",
                iri_ref(auth::INDEX_NAME),
                quoted_literal(&index.name, None, None)
            ),
        ];
        for group in &index.allowed_groups {
            let descriptor =
                serde_json::to_string(group).expect("group descriptors serialize infallibly");
            triples.push(format!(
                "{subject} {} {}",
                iri_ref(auth::HAS_ALLOWED_GROUP),
                quoted_literal(&descriptor, None, None)
            ));
        }
        for group in &index.used_groups {
            let descriptor =
                serde_json::to_string(group).expect("group descriptors serialize infallibly");
            triples.push(format!(
                "{subject} {} {}",
                iri_ref(auth::HAS_USED_GROUP),
                quoted_literal(&descriptor, None, None)
            ));
        }

        let update = format!(
            "INSERT DATA {{ GRAPH {} {{ {} }} }}",
            iri_ref(auth::GRAPH),
            triples.join(" . ")
        );
        self.store.update(&update, &AuthScope::Sudo).await?;
        Ok(())
    }

    async fn delete_catalog_row(&self, index_name: &str) -> Result<()> {
        let update = format!(
            "DELETE WHERE {{ GRAPH {} {{ ?index {} {} . ?index ?p ?o }} }}",
            iri_ref(auth::GRAPH),
            iri_ref(auth::INDEX_NAME),
            quoted_literal(index_name, None, None)
        );
        self.store.update(&update, &AuthScope::Sudo).await?;
        Ok(())
    }

    /// Load persisted catalog rows into the registry without touching
    /// Search-Engine state. Loaded indexes are trusted as valid; anything
    /// that later fails invalidates them through the normal lifecycle.
    async fn load_catalog(&self) -> Result<()> {
        let query = format!(
            "SELECT ?index ?uuid ?typeName ?indexName ?allowedGroup ?usedGroup WHERE {{ \
             GRAPH {} {{ \
             ?index a {} . \
             ?index {} ?uuid . \
             ?index {} ?typeName . \
             ?index {} ?indexName . \
             OPTIONAL {{ ?index {} ?allowedGroup }} \
             OPTIONAL {{ ?index {} ?usedGroup }} \
             }} }}",
            iri_ref(auth::GRAPH),
            iri_ref(auth::ELASTICSEARCH_INDEX),
            iri_ref(mu::UUID),
            iri_ref(auth::OBJECT_TYPE),
            iri_ref(auth::INDEX_NAME),
            iri_ref(auth::HAS_ALLOWED_GROUP),
            iri_ref(auth::HAS_USED_GROUP),
        );
        let results = self.store.select(&query, &AuthScope::Sudo).await?;

        #[derive(Default)]
        struct Row {
            type_name: String,
            index_name: String,
            allowed: Vec<AllowedGroup>,
            used: Vec<AllowedGroup>,
        }

        let mut rows: BTreeMap<String, Row> = BTreeMap::new();
        for binding in &results.bindings {
            let Some(index_term) = binding.get("index") else { continue };
            let row = rows.entry(index_term.value.clone()).or_default();
            if let Some(term) = binding.get("typeName") {
                row.type_name = term.value.clone();
            }
            if let Some(term) = binding.get("indexName") {
                row.index_name = term.value.clone();
            }
            for (var, target) in [("allowedGroup", 0usize), ("usedGroup", 1usize)] {
                let Some(term) = binding.get(var) else { continue };
                match serde_json::from_str::<AllowedGroup>(&term.value) {
                    Ok(group) => {
                        let list = if target == 0 { &mut row.allowed } else { &mut row.used };
                        if !list.contains(&group) {
                            list.push(group);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            value = %term.value,
                            "skipping malformed group descriptor in catalog"
                        );
                    }
                }
            }
        }

        for (uri, row) in rows {
            if self.config.definition(&row.type_name).is_none() {
                tracing::warn!(
                    type_name = %row.type_name,
                    index = %row.index_name,
                    "persisted index references unconfigured type, skipping"
                );
                continue;
            }
            let index = Arc::new(SearchIndex::new(
                uri,
                row.index_name,
                row.type_name,
                canonical_groups(&row.allowed),
                canonical_groups(&row.used),
                IndexStatus::Valid,
            ));
            self.registry.insert(index);
        }

        tracing::info!(count = self.registry.len(), "loaded persisted index catalog");
        Ok(())
    }

    /// Drop every persisted index from the Search Engine and the catalog.
    async fn wipe_persisted(&self) -> Result<()> {
        let query = format!(
            "SELECT DISTINCT ?indexName WHERE {{ GRAPH {} {{ \
             ?index a {} . ?index {} ?indexName }} }}",
            iri_ref(auth::GRAPH),
            iri_ref(auth::ELASTICSEARCH_INDEX),
            iri_ref(auth::INDEX_NAME),
        );
        let results = self.store.select(&query, &AuthScope::Sudo).await?;
        for term in results.column("indexName") {
            if let Err(e) = self.engine.delete_index(&term.value).await {
                tracing::warn!(error = %e, index = %term.value, "failed to delete stale index");
            }
        }

        let update = format!(
            "DELETE WHERE {{ GRAPH {} {{ ?index a {} . ?index ?p ?o }} }}",
            iri_ref(auth::GRAPH),
            iri_ref(auth::ELASTICSEARCH_INDEX),
        );
        self.store.update(&update, &AuthScope::Sudo).await?;
        Ok(())
    }
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("indexes", &self.registry.len())
            .finish()
    }
}
