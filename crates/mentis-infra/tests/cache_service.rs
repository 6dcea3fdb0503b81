//! End-to-end cache flows: SQLite artifact store + in-memory vector index +
//! mock embedding provider composed through the core cache service.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::{Map, json};
use uuid::Uuid;

use mentis_core::embedding::{BoxEmbeddingProvider, EmbeddingEngine};
use mentis_core::repository::ArtifactRepository;
use mentis_core::service::CacheService;
use mentis_infra::embedding::MockEmbeddingProvider;
use mentis_infra::sqlite::{DatabasePool, SqliteArtifactRepository};
use mentis_infra::vector::InMemoryVectorIndex;
use mentis_types::artifact::{Artifact, ArtifactType, LookupOptions};

struct Harness {
    service: CacheService<SqliteArtifactRepository, InMemoryVectorIndex>,
    artifacts: SqliteArtifactRepository,
    vectors: InMemoryVectorIndex,
    engine: Arc<EmbeddingEngine>,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    std::mem::forget(dir);

    let pool = DatabasePool::new(&url).await.unwrap();
    let artifacts = SqliteArtifactRepository::new(pool);
    let vectors = InMemoryVectorIndex::new();
    let engine = Arc::new(EmbeddingEngine::new(BoxEmbeddingProvider::new(
        MockEmbeddingProvider::new(),
    )));

    Harness {
        service: CacheService::new(artifacts.clone(), vectors.clone(), Arc::clone(&engine)),
        artifacts,
        vectors,
        engine,
    }
}

fn draft(content: &str) -> Artifact {
    Artifact {
        id: Uuid::nil(),
        artifact_type: ArtifactType::Raw,
        content_hash: String::new(),
        content: Some(content.as_bytes().to_vec()),
        embedding: Vec::new(),
        dependencies: Vec::new(),
        metadata: Map::new(),
        created_at: DateTime::UNIX_EPOCH,
        updated_at: DateTime::UNIX_EPOCH,
        stale: false,
    }
}

async fn draft_embedded(harness: &Harness, content: &str) -> Artifact {
    let mut artifact = draft(content);
    artifact.embedding = harness.engine.embed(content).await.unwrap();
    artifact
}

fn lookup_options(query: &str, min_score: f32, include_stale: bool) -> LookupOptions {
    LookupOptions {
        query: query.to_string(),
        top_k: 10,
        min_score,
        artifact_type: None,
        include_stale,
        include_content: false,
        include_embedding: false,
    }
}

#[tokio::test]
async fn dedup_on_publish() {
    let harness = setup().await;

    let first = harness.service.publish(vec![draft("hello")]).await.unwrap();
    assert_eq!(first.published.len(), 1);
    assert!(first.skipped.is_empty());

    let second = harness.service.publish(vec![draft("hello")]).await.unwrap();
    assert!(second.published.is_empty());
    assert_eq!(second.skipped, first.published);
}

#[tokio::test]
async fn publish_then_get_roundtrips() {
    let harness = setup().await;

    let mut artifact = draft("roundtrip body");
    artifact
        .metadata
        .insert("source_url".to_string(), json!("https://example.com/r"));
    let id = harness.service.publish(vec![artifact]).await.unwrap().published[0];

    let loaded = harness.service.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.artifact_type, ArtifactType::Raw);
    assert_eq!(loaded.content.as_deref(), Some(b"roundtrip body".as_slice()));
    assert_eq!(
        loaded.content_hash,
        mentis_core::hash::content_hash(b"roundtrip body")
    );
    assert_eq!(loaded.metadata["source_url"], json!("https://example.com/r"));
    assert!(!Artifact::timestamp_is_unset(&loaded.created_at));
    assert!(!loaded.stale);
}

#[tokio::test]
async fn semantic_miss_with_mock_provider() {
    let harness = setup().await;

    let alpha = draft_embedded(&harness, "alpha").await;
    harness.service.publish(vec![alpha]).await.unwrap();

    let miss = harness
        .service
        .lookup(lookup_options("beta", 0.99, false))
        .await
        .unwrap();
    assert!(miss.results.is_empty());

    let hit = harness
        .service
        .lookup(lookup_options("alpha", 0.99, false))
        .await
        .unwrap();
    assert_eq!(hit.results.len(), 1);
    assert!(hit.results[0].score >= 0.99);
}

#[tokio::test]
async fn lookup_respects_include_flags() {
    let harness = setup().await;
    let alpha = draft_embedded(&harness, "alpha").await;
    harness.service.publish(vec![alpha]).await.unwrap();

    let stripped = harness
        .service
        .lookup(lookup_options("alpha", 0.5, false))
        .await
        .unwrap();
    assert!(stripped.results[0].artifact.content.is_none());
    assert!(stripped.results[0].artifact.embedding.is_empty());

    let mut with_content = lookup_options("alpha", 0.5, false);
    with_content.include_content = true;
    let full = harness.service.lookup(with_content).await.unwrap();
    assert_eq!(
        full.results[0].artifact.content.as_deref(),
        Some(b"alpha".as_slice())
    );
}

#[tokio::test]
async fn lookup_zero_top_k_returns_empty() {
    let harness = setup().await;
    let alpha = draft_embedded(&harness, "alpha").await;
    harness.service.publish(vec![alpha]).await.unwrap();

    let mut options = lookup_options("alpha", 0.0, true);
    options.top_k = 0;
    let response = harness.service.lookup(options).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn invalidation_by_source_url() {
    let harness = setup().await;

    let mut artifact = draft_embedded(&harness, "scraped page").await;
    artifact.metadata.insert("source_url".to_string(), json!("u"));
    let id = harness.service.publish(vec![artifact]).await.unwrap().published[0];

    let marked = harness.service.invalidate("u").await.unwrap();
    assert_eq!(marked, 1);
    assert!(harness.service.get_by_id(id).await.unwrap().unwrap().stale);

    let excluded = harness
        .service
        .lookup(lookup_options("scraped page", 0.5, false))
        .await
        .unwrap();
    assert!(excluded.results.is_empty());

    let included = harness
        .service
        .lookup(lookup_options("scraped page", 0.5, true))
        .await
        .unwrap();
    assert_eq!(included.results.len(), 1);
    assert!(included.results[0].artifact.stale);
}

#[tokio::test]
async fn invalidation_propagates_to_dependents() {
    let harness = setup().await;

    let mut raw = draft_embedded(&harness, "raw page").await;
    raw.metadata.insert("source_url".to_string(), json!("u"));
    let raw_id = harness.service.publish(vec![raw]).await.unwrap().published[0];

    let mut derived = draft_embedded(&harness, "derived summary").await;
    derived.artifact_type = ArtifactType::Derived;
    derived.dependencies = vec![raw_id];
    let derived_id = harness.service.publish(vec![derived]).await.unwrap().published[0];

    assert_eq!(harness.service.invalidate("u").await.unwrap(), 2);
    assert!(harness.service.get_by_id(raw_id).await.unwrap().unwrap().stale);
    assert!(
        harness
            .service
            .get_by_id(derived_id)
            .await
            .unwrap()
            .unwrap()
            .stale
    );

    // Idempotent: no re-marking, no re-bump
    let before = harness
        .service
        .get_by_id(raw_id)
        .await
        .unwrap()
        .unwrap()
        .updated_at;
    assert_eq!(harness.service.invalidate("u").await.unwrap(), 0);
    let after = harness
        .service
        .get_by_id(raw_id)
        .await
        .unwrap()
        .unwrap()
        .updated_at;
    assert_eq!(before, after);
}

#[tokio::test]
async fn cascade_delete() {
    let harness = setup().await;

    let parent = draft_embedded(&harness, "parent").await;
    let parent_id = harness.service.publish(vec![parent]).await.unwrap().published[0];

    let mut child = draft_embedded(&harness, "child").await;
    child.dependencies = vec![parent_id];
    let child_id = harness.service.publish(vec![child]).await.unwrap().published[0];

    assert_eq!(
        harness.artifacts.get_dependencies(child_id).await.unwrap(),
        vec![parent_id]
    );

    harness.service.delete(parent_id).await.unwrap();

    assert!(harness.service.get_by_id(parent_id).await.unwrap().is_none());
    assert!(
        harness
            .artifacts
            .get_dependencies(child_id)
            .await
            .unwrap()
            .is_empty()
    );
    // The parent's vector is gone too; the child's remains
    assert_eq!(harness.vectors.len(), 1);

    // Idempotent repeat
    harness.service.delete(parent_id).await.unwrap();
}

#[tokio::test]
async fn delete_then_lookup_never_returns_id() {
    let harness = setup().await;
    let alpha = draft_embedded(&harness, "alpha").await;
    let id = harness.service.publish(vec![alpha]).await.unwrap().published[0];

    harness.service.delete(id).await.unwrap();

    assert!(harness.service.get_by_id(id).await.unwrap().is_none());
    let results = harness
        .service
        .lookup(lookup_options("alpha", 0.0, true))
        .await
        .unwrap();
    assert!(results.results.iter().all(|r| r.artifact.id != id));
}

#[tokio::test]
async fn every_embedded_artifact_has_a_vector_point() {
    let harness = setup().await;

    let embedded_one = draft_embedded(&harness, "first").await;
    let embedded_two = draft_embedded(&harness, "second").await;
    let plain = draft("third, no embedding");

    let response = harness
        .service
        .publish(vec![embedded_one, embedded_two, plain])
        .await
        .unwrap();
    assert_eq!(response.published.len(), 3);

    // Only the embedded artifacts get vector points
    assert_eq!(harness.vectors.len(), 2);
}
