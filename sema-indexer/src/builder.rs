//! Document builder: fetches a resource's indexed fields under an
//! authorization scope and renders them as a search document.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sema_config::{
    AllowedGroup, PropertyDefinition, PropertyPath, SearchSettings, TypeConfig, TypeDefinition,
};
use sema_sparql::{iri_ref, path_to_sparql, AuthScope, Literal, Triplestore};
use sema_vocab::{mu, share};

use crate::document::{denumerate, smart_merge};
use crate::error::{IndexerError, Result};
use crate::extract::{ExtractionCache, TextExtractor};

/// Builds search documents from triplestore state.
///
/// Every query runs under the authorization scope handed to [`build`];
/// nothing here escalates to sudo.
///
/// [`build`]: DocumentBuilder::build
pub struct DocumentBuilder {
    store: Arc<dyn Triplestore>,
    config: Arc<TypeConfig>,
    settings: Arc<SearchSettings>,
    extractor: Option<Arc<dyn TextExtractor>>,
    cache: ExtractionCache,
}

impl DocumentBuilder {
    pub fn new(
        store: Arc<dyn Triplestore>,
        config: Arc<TypeConfig>,
        settings: Arc<SearchSettings>,
        extractor: Option<Arc<dyn TextExtractor>>,
    ) -> Self {
        let cache = ExtractionCache::new(&settings.extraction_cache_base);
        Self {
            store,
            config,
            settings,
            extractor,
            cache,
        }
    }

    /// Build the document for a resource under an authorization-group set.
    ///
    /// For composite indexes the resource's rdf:types select the applicable
    /// sub-definitions and their documents are smart-merged; otherwise the
    /// type's own definition applies directly.
    pub async fn build(
        &self,
        uri: &str,
        type_name: &str,
        groups: &[AllowedGroup],
    ) -> Result<JsonValue> {
        let scope = AuthScope::groups(groups);

        if self.config.is_composite_index(type_name) {
            return self.build_composite(uri, type_name, &scope).await;
        }

        let def = self
            .config
            .definition(type_name)
            .ok_or_else(|| IndexerError::UnknownType(type_name.to_string()))?;
        self.build_from_definition(uri, def, &scope).await
    }

    async fn build_composite(
        &self,
        uri: &str,
        type_name: &str,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let query = format!("SELECT DISTINCT ?type WHERE {{ {} a ?type }}", iri_ref(uri));
        let results = self.store.select(&query, scope).await?;
        let resource_types: Vec<&str> = results
            .column("type")
            .filter(|term| term.is_uri())
            .map(|term| term.value.as_str())
            .collect();

        let mut document = JsonValue::Object(JsonMap::new());
        for (member_name, member_def) in self.config.composite_definitions(type_name) {
            let applies = self
                .config
                .related_rdf_types(member_name)
                .iter()
                .any(|t| resource_types.contains(&t.as_str()));
            if !applies {
                continue;
            }
            let sub_document = self.build_from_definition(uri, member_def, scope).await?;
            document = smart_merge(document, sub_document)?;
        }
        Ok(document)
    }

    async fn build_from_definition(
        &self,
        uri: &str,
        def: &TypeDefinition,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        // Every document carries the resource uuid unless the definition
        // overrides the field.
        let uuid_default = PropertyDefinition::Simple {
            via: PropertyPath::parse(&[mu::UUID]),
        };
        let mut document = JsonMap::new();
        if !def.properties.contains_key("uuid") {
            let value = self.build_property(uri, &uuid_default, scope).await?;
            document.insert("uuid".to_string(), value);
        }
        for (field, prop) in &def.properties {
            let value = self.build_property(uri, prop, scope).await?;
            document.insert(field.clone(), value);
        }
        Ok(JsonValue::Object(document))
    }

    async fn build_properties(
        &self,
        uri: &str,
        properties: &BTreeMap<String, PropertyDefinition>,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let mut document = JsonMap::new();
        document.insert("uri".to_string(), JsonValue::String(uri.to_string()));
        for (field, prop) in properties {
            let value = self.build_property(uri, prop, scope).await?;
            document.insert(field.clone(), value);
        }
        Ok(JsonValue::Object(document))
    }

    fn build_property<'a>(
        &'a self,
        uri: &'a str,
        prop: &'a PropertyDefinition,
        scope: &'a AuthScope,
    ) -> BoxFuture<'a, Result<JsonValue>> {
        async move {
            match prop {
                PropertyDefinition::Simple { via } => self.fetch_simple(uri, via, scope).await,
                PropertyDefinition::LanguageString { via } => {
                    self.fetch_language_string(uri, via, scope).await
                }
                PropertyDefinition::Attachment { via } => {
                    self.fetch_attachments(uri, via, scope).await
                }
                PropertyDefinition::Nested { via, properties } => {
                    self.fetch_nested(uri, via, properties, scope).await
                }
            }
        }
        .boxed()
    }

    async fn fetch_simple(
        &self,
        uri: &str,
        via: &PropertyPath,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let query = format!(
            "SELECT DISTINCT ?v WHERE {{ {} {} ?v }}",
            iri_ref(uri),
            path_to_sparql(via.steps())
        );
        let results = self.store.select(&query, scope).await?;
        let values: Vec<JsonValue> = results
            .column("v")
            .map(|term| Literal::from_binding(term).into_json())
            .collect();
        Ok(denumerate(values))
    }

    async fn fetch_language_string(
        &self,
        uri: &str,
        via: &PropertyPath,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let query = format!(
            "SELECT DISTINCT ?v ?lang WHERE {{ {} {} ?v . BIND(LANG(?v) AS ?lang) }}",
            iri_ref(uri),
            path_to_sparql(via.steps())
        );
        let results = self.store.select(&query, scope).await?;

        let mut buckets: BTreeMap<String, Vec<JsonValue>> = BTreeMap::new();
        for row in &results.bindings {
            let Some(value) = row.get("v") else { continue };
            let lang = row
                .get("lang")
                .map(|term| term.value.as_str())
                .filter(|lang| !lang.is_empty())
                .unwrap_or("default");
            buckets
                .entry(lang.to_string())
                .or_default()
                .push(JsonValue::String(value.value.clone()));
        }

        if buckets.is_empty() {
            return Ok(JsonValue::Null);
        }
        let map: JsonMap<String, JsonValue> = buckets
            .into_iter()
            .map(|(lang, values)| (lang, JsonValue::Array(values)))
            .collect();
        // The bucket map is one document value; it stays wrapped in a
        // single-element list.
        Ok(JsonValue::Array(vec![JsonValue::Object(map)]))
    }

    async fn fetch_attachments(
        &self,
        uri: &str,
        via: &PropertyPath,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let query = format!(
            "SELECT DISTINCT ?v WHERE {{ {} {} ?v }}",
            iri_ref(uri),
            path_to_sparql(via.steps())
        );
        let results = self.store.select(&query, scope).await?;

        let mut files = Vec::new();
        for term in results.column("v") {
            let relative = term
                .value
                .strip_prefix(share::SCHEME)
                .unwrap_or(term.value.as_str());
            let path = self.settings.attachment_path_base.join(relative);
            let content = self.attachment_content(&path).await;
            files.push(json!({ "content": content }));
        }
        Ok(denumerate(files))
    }

    async fn attachment_content(&self, path: &Path) -> Option<String> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "attachment not readable");
                return None;
            }
        };
        if metadata.len() > self.settings.maximum_file_size {
            tracing::debug!(
                path = %path.display(),
                size = metadata.len(),
                "attachment exceeds maximum file size"
            );
            return None;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read attachment");
                return None;
            }
        };

        let extractor = self.extractor.as_ref()?;
        self.cache
            .get_or_extract(path, &bytes, extractor.as_ref())
            .await
    }

    async fn fetch_nested(
        &self,
        uri: &str,
        via: &PropertyPath,
        properties: &BTreeMap<String, PropertyDefinition>,
        scope: &AuthScope,
    ) -> Result<JsonValue> {
        let query = format!(
            "SELECT DISTINCT ?v WHERE {{ {} {} ?v }}",
            iri_ref(uri),
            path_to_sparql(via.steps())
        );
        let results = self.store.select(&query, scope).await?;
        let related: Vec<String> = results
            .column("v")
            .filter(|term| term.is_uri())
            .map(|term| term.value.clone())
            .collect();

        let mut documents = Vec::with_capacity(related.len());
        for related_uri in &related {
            documents.push(self.build_properties(related_uri, properties, scope).await?);
        }
        Ok(denumerate(documents))
    }
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("config_types", &self.config.type_names().count())
            .finish()
    }
}
