//! Index manager lifecycle tests: ensure, rebuild, fetch, remove,
//! initialize.

mod support;

use std::sync::Arc;
use tokio::sync::watch;

use sema_config::{index_name, AllowedGroup, SearchSettings, TypeConfig, TypeDefinition};
use sema_config::{PropertyDefinition, PropertyPath};
use sema_elastic::{MemoryBackend, SearchBackend};
use sema_indexer::{DocumentBuilder, IndexManager, IndexStatus};

use support::{results, term_literal, uri_results, ScriptedStore};

const DOC_TYPE: &str = "http://ex.org/Document";
const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";

fn document_config() -> TypeConfig {
    let def = TypeDefinition {
        rdf_types: vec![DOC_TYPE.to_string()],
        properties: [(
            "title".to_string(),
            PropertyDefinition::Simple {
                via: PropertyPath::parse(&[DC_TITLE]),
            },
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    };
    TypeConfig::new([("document".to_string(), def)].into_iter().collect()).unwrap()
}

struct Fixture {
    store: Arc<ScriptedStore>,
    engine: Arc<MemoryBackend>,
    manager: IndexManager,
}

fn fixture(settings: SearchSettings) -> Fixture {
    let store = Arc::new(ScriptedStore::new());
    let engine = Arc::new(MemoryBackend::new());
    let config = Arc::new(document_config());
    let settings = Arc::new(settings);
    let (_tx, rx) = watch::channel(false);
    // The sender is dropped; the receiver keeps reporting false, which is
    // fine for tests that never shut down.
    let builder = Arc::new(DocumentBuilder::new(
        store.clone(),
        config.clone(),
        settings.clone(),
        None,
    ));
    let manager = IndexManager::new(
        store.clone(),
        engine.clone(),
        config,
        settings,
        builder,
        rx,
    );
    Fixture {
        store,
        engine,
        manager,
    }
}

fn public() -> Vec<AllowedGroup> {
    vec![AllowedGroup::new("public")]
}

#[tokio::test]
async fn test_ensure_creates_registry_entry_and_engine_index() {
    let f = fixture(SearchSettings::default());

    let index = f.manager.ensure_index("document", &public(), &[]).await.unwrap();
    assert_eq!(index.status(), IndexStatus::Invalid);
    assert_eq!(index.name, index_name("document", &public()));
    assert!(f.engine.index_exists(&index.name).await.unwrap());
    assert_eq!(f.manager.registry().len(), 1);

    // Idempotent: a second ensure returns the same entry.
    let again = f.manager.ensure_index("document", &public(), &[]).await.unwrap();
    assert!(Arc::ptr_eq(&index, &again));
    assert_eq!(f.manager.registry().len(), 1);
}

#[tokio::test]
async fn test_ensure_unknown_type_fails() {
    let f = fixture(SearchSettings::default());
    assert!(f.manager.ensure_index("nope", &public(), &[]).await.is_err());
}

#[tokio::test]
async fn test_fetch_rebuilds_to_valid_and_indexes_documents() {
    let f = fixture(SearchSettings::default());
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &["http://ex.org/doc1", "http://ex.org/doc2"]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, "http://ex.org/doc1"],
        results(vec![vec![("v", term_literal("first"))]]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, "http://ex.org/doc2"],
        results(vec![vec![("v", term_literal("second"))]]),
    );

    let indexes = f.manager.fetch_indexes_for("document", &public(), &[]).await.unwrap();
    assert_eq!(indexes.len(), 1);
    let index = &indexes[0];

    assert_eq!(index.status(), IndexStatus::Valid);
    assert_eq!(f.engine.doc_count(&index.name), 2);
    let doc = f.engine.document(&index.name, "http://ex.org/doc1").unwrap();
    assert_eq!(doc["title"], serde_json::json!("first"));
}

#[tokio::test]
async fn test_failed_rebuild_leaves_index_invalid() {
    let f = fixture(SearchSettings::default());
    f.store.on_fail(&["SELECT DISTINCT ?resource"]);

    let indexes = f.manager.fetch_indexes_for("document", &public(), &[]).await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].status(), IndexStatus::Invalid);

    // A later fetch retries the rebuild once the store recovers.
    f.store.reset_rules();
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &["http://ex.org/doc1"]),
    );
    let indexes = f.manager.fetch_indexes_for("document", &public(), &[]).await.unwrap();
    assert_eq!(indexes[0].status(), IndexStatus::Valid);
    assert_eq!(f.engine.doc_count(&indexes[0].name), 1);
}

#[tokio::test]
async fn test_document_failure_does_not_abort_rebuild() {
    let f = fixture(SearchSettings::default());
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &["http://ex.org/bad", "http://ex.org/good"]),
    );
    f.store.on_fail(&["SELECT DISTINCT ?v", "http://ex.org/bad"]);
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, "http://ex.org/good"],
        results(vec![vec![("v", term_literal("ok"))]]),
    );

    let indexes = f.manager.fetch_indexes_for("document", &public(), &[]).await.unwrap();
    let index = &indexes[0];

    // The failing document is skipped; the rebuild as a whole succeeds.
    assert_eq!(index.status(), IndexStatus::Valid);
    assert_eq!(f.engine.doc_count(&index.name), 1);
    assert!(f.engine.document(&index.name, "http://ex.org/good").is_some());
}

#[tokio::test]
async fn test_additive_indexes_one_per_group() {
    let f = fixture(SearchSettings::default().with_additive_indexes(true));
    let groups = vec![AllowedGroup::new("public"), AllowedGroup::new("org")];

    let indexes = f.manager.fetch_indexes_for("document", &groups, &[]).await.unwrap();
    assert_eq!(indexes.len(), 2);
    assert_eq!(f.manager.registry().len(), 2);
    for index in &indexes {
        assert_eq!(index.allowed_groups.len(), 1);
        assert_eq!(index.status(), IndexStatus::Valid);
    }
}

#[tokio::test]
async fn test_remove_index_deletes_engine_index() {
    let f = fixture(SearchSettings::default());
    let index = f.manager.ensure_index("document", &public(), &[]).await.unwrap();
    assert!(f.engine.index_exists(&index.name).await.unwrap());

    f.manager.remove_index("document", &public()).await.unwrap();
    assert!(!f.engine.index_exists(&index.name).await.unwrap());
    assert!(f.manager.registry().is_empty());
}

#[tokio::test]
async fn test_persisted_catalog_row_written_once() {
    let f = fixture(SearchSettings::default().with_persist_indexes(true));

    let index = f.manager.ensure_index("document", &public(), &[]).await.unwrap();

    let updates = f.store.recorded_updates();
    assert_eq!(updates.len(), 1);
    let insert = &updates[0];
    assert!(insert.sudo);
    assert!(insert.query.contains("INSERT DATA"));
    assert!(insert.query.contains(&index.name));
    assert!(insert.query.contains("ElasticsearchIndex"));
    assert!(insert.query.contains(r#"{\"name\":\"public\",\"variables\":[]}"#));
}

#[tokio::test]
async fn test_remove_index_deletes_catalog_row_when_persisting() {
    let f = fixture(SearchSettings::default().with_persist_indexes(true));
    let index = f.manager.ensure_index("document", &public(), &[]).await.unwrap();

    f.manager.remove_index("document", &public()).await.unwrap();

    let updates = f.store.recorded_updates();
    let delete = updates.last().unwrap();
    assert!(delete.sudo);
    assert!(delete.query.contains("DELETE WHERE"));
    assert!(delete.query.contains(&index.name));
}

#[tokio::test]
async fn test_initialize_without_persistence_wipes_stale_indexes() {
    let f = fixture(SearchSettings::default());
    // A stale persisted index from a previous run.
    f.engine.create_index("stale-index", None, None).await.unwrap();
    f.store.on_select(
        &["SELECT DISTINCT ?indexName"],
        results(vec![vec![("indexName", term_literal("stale-index"))]]),
    );

    f.manager.initialize().await.unwrap();

    assert!(!f.engine.index_exists("stale-index").await.unwrap());
    let wipe = f.store.recorded_updates();
    assert!(wipe.iter().any(|u| u.sudo && u.query.contains("DELETE WHERE")));
    assert!(f.manager.registry().is_empty());
}

#[tokio::test]
async fn test_initialize_with_persistence_loads_catalog() {
    let f = fixture(SearchSettings::default().with_persist_indexes(true));
    let name = index_name("document", &public());
    f.store.on_select(
        &["ElasticsearchIndex", "hasAllowedGroup"],
        results(vec![vec![
            ("index", support::term_uri("http://ex.org/indexes/1")),
            ("uuid", term_literal("uuid-1")),
            ("typeName", term_literal("document")),
            ("indexName", term_literal(&name)),
            (
                "allowedGroup",
                term_literal(r#"{"name":"public","variables":[]}"#),
            ),
        ]]),
    );

    f.manager.initialize().await.unwrap();

    let index = f.manager.registry().get("document", &public()).unwrap();
    assert_eq!(index.name, name);
    assert_eq!(index.status(), IndexStatus::Valid);
    // Loading does not touch Search-Engine state.
    assert!(f.engine.index_names().is_empty());
}

#[tokio::test]
async fn test_eager_initialization_builds_configured_groups() {
    let f = fixture(
        SearchSettings::default().with_eager_indexing_groups(vec![public()]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &["http://ex.org/doc1"]),
    );

    f.manager.initialize().await.unwrap();

    let index = f.manager.registry().get("document", &public()).unwrap();
    assert_eq!(index.status(), IndexStatus::Valid);
    assert_eq!(f.engine.doc_count(&index.name), 1);
}
