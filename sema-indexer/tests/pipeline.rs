//! End-to-end pipeline tests: delta in, search-engine state out.
//!
//! Each test enqueues deltas before starting the workers, so rule changes
//! on the scripted store are deterministic: rebuilds happen first (via
//! `fetch_indexes_for`), ingestion routes against the post-delta rules,
//! and `shutdown` drains the queue before assertions.

mod support;

use serde_json::json;
use std::sync::Arc;

use sema_config::{
    AllowedGroup, PropertyDefinition, PropertyPath, SearchSettings, TypeConfig, TypeDefinition,
};
use sema_elastic::{MemoryBackend, SearchBackend};
use sema_indexer::SearchPipeline;
use sema_vocab::rdf;

use support::{results, term_literal, uri_results, ScriptedStore};

const DOC_TYPE: &str = "http://ex.org/Document";
const CASE_TYPE: &str = "http://ex.org/Case";
const PARENT_TYPE: &str = "http://ex.org/Parent";
const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";
const DCT_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
const DCT_HAS_PART: &str = "http://purl.org/dc/terms/hasPart";
const DOC5: &str = "http://ex.org/doc5";

fn simple(field: &str, path: &[&str]) -> (String, PropertyDefinition) {
    (
        field.to_string(),
        PropertyDefinition::Simple {
            via: PropertyPath::parse(path),
        },
    )
}

fn document_config() -> TypeConfig {
    let def = TypeDefinition {
        rdf_types: vec![DOC_TYPE.to_string()],
        properties: [simple("title", &[DC_TITLE])].into_iter().collect(),
        ..Default::default()
    };
    TypeConfig::new([("document".to_string(), def)].into_iter().collect()).unwrap()
}

fn public() -> Vec<AllowedGroup> {
    vec![AllowedGroup::new("public")]
}

struct Fixture {
    store: Arc<ScriptedStore>,
    engine: Arc<MemoryBackend>,
    pipeline: SearchPipeline,
}

fn fixture(config: TypeConfig) -> Fixture {
    let store = Arc::new(ScriptedStore::new());
    let engine = Arc::new(MemoryBackend::new());
    let pipeline = SearchPipeline::new(
        config,
        SearchSettings::default(),
        store.clone(),
        engine.clone(),
        None,
    );
    Fixture {
        store,
        engine,
        pipeline,
    }
}

fn insert_title_delta() -> Vec<u8> {
    json!([{
        "inserts": [{
            "subject":   {"type": "uri", "value": DOC5},
            "predicate": {"type": "uri", "value": DC_TITLE},
            "object":    {"type": "literal", "value": "giraffes"}
        }],
        "deletes": []
    }])
    .to_string()
    .into_bytes()
}

async fn search_count(engine: &MemoryBackend, index: &str, field: &str, value: &str) -> u64 {
    let result = engine
        .search(index, json!({"query": {"match": {field: value}}}))
        .await
        .unwrap();
    result["hits"]["total"]["value"].as_u64().unwrap()
}

#[tokio::test]
async fn test_insert_becomes_searchable() {
    let f = fixture(document_config());
    f.store.on_select(
        &["SELECT DISTINCT ?s", &format!("VALUES ?s {{ <{DOC5}> }}")],
        uri_results("s", &[DOC5]),
    );
    f.store.on_ask(&[&format!("<{DOC5}> a ?type")], true);
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, DOC5],
        results(vec![vec![("v", term_literal("giraffes"))]]),
    );

    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();

    let jobs = f.pipeline.handle_delta(&insert_title_delta()).await.unwrap();
    assert_eq!(jobs, 1);

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    assert_eq!(search_count(&f.engine, &index_name, "title", "giraffes").await, 1);

    // Root resolution ran sudo; the document fetch did not.
    let selects = f.store.recorded_selects();
    let resolution = selects.iter().find(|q| q.query.contains("VALUES ?s")).unwrap();
    assert!(resolution.sudo);
    let fetch = selects
        .iter()
        .find(|q| q.query.contains("SELECT DISTINCT ?v") && q.query.contains(DC_TITLE))
        .unwrap();
    assert!(!fetch.sudo);
}

#[tokio::test]
async fn test_title_delete_removes_match() {
    let f = fixture(document_config());
    // Rebuild world: doc5 exists with its title.
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &[DOC5]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, DOC5],
        results(vec![vec![("v", term_literal("giraffes"))]]),
    );

    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();
    assert_eq!(search_count(&f.engine, &index_name, "title", "giraffes").await, 1);

    // Post-delete world: the triple is gone, the resource remains typed.
    f.store.reset_rules();
    f.store.on_select(
        &["SELECT DISTINCT ?s", &format!("VALUES ?s {{ <{DOC5}> }}")],
        uri_results("s", &[DOC5]),
    );
    f.store.on_ask(&[&format!("<{DOC5}> a ?type")], true);

    let delta = json!([{
        "deletes": [{
            "subject":   {"type": "uri", "value": DOC5},
            "predicate": {"type": "uri", "value": DC_TITLE},
            "object":    {"type": "literal", "value": "giraffes"}
        }]
    }])
    .to_string()
    .into_bytes();
    f.pipeline.handle_delta(&delta).await.unwrap();

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    assert_eq!(search_count(&f.engine, &index_name, "title", "giraffes").await, 0);
    // The document itself is re-derived, not removed.
    assert_eq!(f.engine.doc_count(&index_name), 1);
}

#[tokio::test]
async fn test_rdf_type_delete_removes_from_every_index() {
    let f = fixture(document_config());
    // Two indexes for the same type under different group sets.
    f.store.on_select(
        &["SELECT DISTINCT ?resource", DOC_TYPE],
        uri_results("resource", &[DOC5]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, DOC5],
        results(vec![vec![("v", term_literal("giraffes"))]]),
    );
    let public_indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let org_indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &[AllowedGroup::new("org")], &[])
        .await
        .unwrap();
    assert_eq!(f.engine.doc_count(&public_indexes[0].name), 1);
    assert_eq!(f.engine.doc_count(&org_indexes[0].name), 1);

    // Post-delete world: doc5 is no longer of the type (ASK defaults to
    // false with no rule).
    f.store.reset_rules();

    let delta = json!([{
        "deletes": [{
            "subject":   {"type": "uri", "value": DOC5},
            "predicate": {"type": "uri", "value": rdf::TYPE},
            "object":    {"type": "uri", "value": DOC_TYPE}
        }]
    }])
    .to_string()
    .into_bytes();
    f.pipeline.handle_delta(&delta).await.unwrap();

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    assert_eq!(f.engine.doc_count(&public_indexes[0].name), 0);
    assert_eq!(f.engine.doc_count(&org_indexes[0].name), 0);
}

#[tokio::test]
async fn test_inverse_path_reindexes_parent() {
    let parent_def = TypeDefinition {
        rdf_types: vec![PARENT_TYPE.to_string()],
        properties: [simple("part_title", &[&format!("^{DCT_HAS_PART}"), DC_TITLE])]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let config =
        TypeConfig::new([("parent".to_string(), parent_def)].into_iter().collect()).unwrap();
    let f = fixture(config);

    let parent = "http://ex.org/parent";
    f.store.on_select(
        &["SELECT DISTINCT ?s", &format!("VALUES ?s {{ <{parent}> }}")],
        uri_results("s", &[parent]),
    );
    f.store.on_ask(&[&format!("<{parent}> a ?type")], true);
    f.store.on_select(
        &["SELECT DISTINCT ?v", DCT_HAS_PART, DC_TITLE],
        results(vec![vec![("v", term_literal("chapter one"))]]),
    );

    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("parent", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();

    // <child> hasPart <parent>: the parent document must be re-derived.
    let delta = json!([{
        "inserts": [{
            "subject":   {"type": "uri", "value": "http://ex.org/child"},
            "predicate": {"type": "uri", "value": DCT_HAS_PART},
            "object":    {"type": "uri", "value": parent}
        }]
    }])
    .to_string()
    .into_bytes();
    f.pipeline.handle_delta(&delta).await.unwrap();

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    let doc = f.engine.document(&index_name, parent).unwrap();
    assert_eq!(doc["part_title"], json!("chapter one"));
}

#[tokio::test]
async fn test_composite_index_merges_subtype_fields() {
    let document = TypeDefinition {
        rdf_types: vec![DOC_TYPE.to_string()],
        properties: [simple("title", &[DC_TITLE])].into_iter().collect(),
        ..Default::default()
    };
    let case = TypeDefinition {
        rdf_types: vec![CASE_TYPE.to_string()],
        properties: [simple("description", &[DCT_DESCRIPTION])]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let all = TypeDefinition {
        composite_types: Some(vec!["document".to_string(), "case".to_string()]),
        ..Default::default()
    };
    let config = TypeConfig::new(
        [
            ("document".to_string(), document),
            ("case".to_string(), case),
            ("all".to_string(), all),
        ]
        .into_iter()
        .collect(),
    )
    .unwrap();
    let f = fixture(config);

    let thing = "http://ex.org/thing";
    f.store.on_ask(&[&format!("<{thing}> a ?type")], true);
    f.store.on_select(
        &["SELECT DISTINCT ?type", thing],
        uri_results("type", &[DOC_TYPE, CASE_TYPE]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE],
        results(vec![vec![("v", term_literal("a title"))]]),
    );
    f.store.on_select(
        &["SELECT DISTINCT ?v", DCT_DESCRIPTION],
        results(vec![vec![("v", term_literal("a description"))]]),
    );

    // Only the composite index is registered; jobs routed to the member
    // types find no index and are dropped.
    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("all", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();

    let delta = json!([{
        "inserts": [{
            "subject":   {"type": "uri", "value": thing},
            "predicate": {"type": "uri", "value": rdf::TYPE},
            "object":    {"type": "uri", "value": DOC_TYPE}
        }]
    }])
    .to_string()
    .into_bytes();
    f.pipeline.handle_delta(&delta).await.unwrap();

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    let doc = f.engine.document(&index_name, thing).unwrap();
    assert_eq!(doc["title"], json!("a title"));
    assert_eq!(doc["description"], json!("a description"));
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let f = fixture(document_config());
    f.store.on_select(
        &["SELECT DISTINCT ?s", &format!("VALUES ?s {{ <{DOC5}> }}")],
        uri_results("s", &[DOC5]),
    );
    f.store.on_ask(&[&format!("<{DOC5}> a ?type")], true);
    f.store.on_select(
        &["SELECT DISTINCT ?v", DC_TITLE, DOC5],
        results(vec![vec![("v", term_literal("giraffes"))]]),
    );

    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();

    // The same delta twice: jobs coalesce, and the write is idempotent.
    f.pipeline.handle_delta(&insert_title_delta()).await.unwrap();
    f.pipeline.handle_delta(&insert_title_delta()).await.unwrap();
    assert_eq!(f.pipeline.queued_jobs().await, 1);

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    assert_eq!(search_count(&f.engine, &index_name, "title", "giraffes").await, 1);
    assert_eq!(f.engine.doc_count(&index_name), 1);
}

#[tokio::test]
async fn test_conflicting_ops_resolve_to_last_writer() {
    let f = fixture(document_config());
    f.store.on_select(
        &["SELECT DISTINCT ?s", &format!("VALUES ?s {{ <{DOC5}> }}")],
        uri_results("s", &[DOC5]),
    );
    // After the type removal the subject is gone (ASK defaults to false).

    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();
    f.engine
        .upsert_document(&index_name, DOC5, json!({"title": "stale"}))
        .await
        .unwrap();

    // Update then delete for the same subject before any worker runs: the
    // delete wins at dequeue time, as sequential arrival order demands.
    f.pipeline.handle_delta(&insert_title_delta()).await.unwrap();
    let type_delete = json!([{
        "deletes": [{
            "subject":   {"type": "uri", "value": DOC5},
            "predicate": {"type": "uri", "value": rdf::TYPE},
            "object":    {"type": "uri", "value": DOC_TYPE}
        }]
    }])
    .to_string()
    .into_bytes();
    f.pipeline.handle_delta(&type_delete).await.unwrap();
    assert_eq!(f.pipeline.queued_jobs().await, 1);

    f.pipeline.start().await.unwrap();
    f.pipeline.shutdown().await;

    assert_eq!(f.engine.doc_count(&index_name), 0);
}

#[tokio::test]
async fn test_non_array_delta_is_rejected_without_state_change() {
    let f = fixture(document_config());
    let indexes = f
        .pipeline
        .manager()
        .fetch_indexes_for("document", &public(), &[])
        .await
        .unwrap();
    let index_name = indexes[0].name.clone();

    let result = f.pipeline.handle_delta(br#"{"inserts": []}"#).await;
    assert!(result.is_err());
    assert_eq!(f.pipeline.queued_jobs().await, 0);
    assert_eq!(f.engine.doc_count(&index_name), 0);
}
