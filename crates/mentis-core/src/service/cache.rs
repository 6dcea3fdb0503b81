//! The cache service: publish, semantic lookup, retrieval, deletion, and
//! invalidation over the artifact store and vector index.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_types::artifact::{Artifact, LookupOptions, LookupResponse, LookupResult, PublishResponse};
use mentis_types::error::{CacheError, RepositoryError};

use crate::embedding::EmbeddingEngine;
use crate::hash;
use crate::repository::ArtifactRepository;
use crate::service::vector_payload;
use crate::vector::VectorIndex;

/// Cache operations over artifacts.
pub struct CacheService<A, V> {
    artifacts: A,
    vectors: V,
    engine: Arc<EmbeddingEngine>,
}

impl<A: ArtifactRepository, V: VectorIndex> CacheService<A, V> {
    pub fn new(artifacts: A, vectors: V, engine: Arc<EmbeddingEngine>) -> Self {
        Self {
            artifacts,
            vectors,
            engine,
        }
    }

    /// Publish a batch of artifacts.
    ///
    /// Per artifact: assign an id and timestamps when absent, compute the
    /// content hash when empty, skip when the content hash is already
    /// stored, otherwise store the record, index its embedding, and record
    /// its dependency edges.
    ///
    /// The batch is not atomic: a failure mid-batch fails the call and
    /// leaves the already-persisted prefix in place.
    pub async fn publish(&self, objects: Vec<Artifact>) -> Result<PublishResponse, CacheError> {
        let mut published = Vec::new();
        let mut skipped = Vec::new();

        for mut artifact in objects {
            if artifact.id.is_nil() {
                artifact.id = Uuid::now_v7();
            }

            let now = Utc::now();
            if Artifact::timestamp_is_unset(&artifact.created_at) {
                artifact.created_at = now;
            }
            artifact.updated_at = now;

            if artifact.content_hash.is_empty() {
                artifact.content_hash =
                    hash::content_hash(artifact.content.as_deref().unwrap_or_default());
            }

            if let Some(existing) = self
                .artifacts
                .get_by_content_hash(&artifact.content_hash)
                .await?
            {
                skipped.push(existing.id);
                continue;
            }

            match self.artifacts.store(&artifact).await {
                Ok(()) => {}
                Err(RepositoryError::Conflict(_)) => {
                    // Lost the advisory dedup race: a concurrent publish of
                    // identical content won the insert. Downgrade to skip.
                    match self
                        .artifacts
                        .get_by_content_hash(&artifact.content_hash)
                        .await?
                    {
                        Some(existing) => {
                            skipped.push(existing.id);
                            continue;
                        }
                        None => {
                            return Err(RepositoryError::Conflict(format!(
                                "artifact insert conflicted but no row found for hash '{}'",
                                artifact.content_hash
                            ))
                            .into());
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if !artifact.embedding.is_empty() {
                self.vectors
                    .upsert(artifact.id, &artifact.embedding, &vector_payload(&artifact))
                    .await?;
            }

            for parent_id in &artifact.dependencies {
                self.artifacts
                    .store_dependency(*parent_id, artifact.id)
                    .await?;
            }

            published.push(artifact.id);
        }

        Ok(PublishResponse { published, skipped })
    }

    /// Semantic lookup: embed the query, search the vector index, enrich
    /// hits from the artifact store, and strip fields per the options.
    ///
    /// Hits whose artifact no longer exists are dropped (the documented
    /// consistency gap between the two stores). Stale artifacts are dropped
    /// here rather than at the index, because the boolean `stale` filter
    /// value is outside the index's string-equality filter contract.
    pub async fn lookup(&self, options: LookupOptions) -> Result<LookupResponse, CacheError> {
        if options.top_k == 0 {
            return Ok(LookupResponse { results: Vec::new() });
        }

        let query_embedding = self.engine.embed(&options.query).await?;

        let mut filter = Map::new();
        if let Some(artifact_type) = options.artifact_type {
            filter.insert(
                "type".to_string(),
                Value::String(artifact_type.as_str().to_string()),
            );
        }
        if !options.include_stale {
            filter.insert("stale".to_string(), Value::Bool(false));
        }

        let hits = self
            .vectors
            .search(&query_embedding, options.top_k, options.min_score, &filter)
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut artifact = match self.artifacts.get_by_id(hit.id).await {
                Ok(Some(artifact)) => artifact,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(artifact_id = %hit.id, error = %e, "skipping unenrichable lookup hit");
                    continue;
                }
            };

            if artifact.stale && !options.include_stale {
                continue;
            }

            if !options.include_content {
                artifact.content = None;
            }
            if !options.include_embedding {
                artifact.embedding = Vec::new();
            }

            results.push(LookupResult {
                artifact,
                score: hit.score,
            });
        }

        Ok(LookupResponse { results })
    }

    /// Fetch a single artifact by id.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Artifact>, CacheError> {
        Ok(self.artifacts.get_by_id(id).await?)
    }

    /// Delete an artifact and its vector. Vector first, so a failure between
    /// the two leaves a retryable state rather than an orphaned vector.
    pub async fn delete(&self, id: Uuid) -> Result<(), CacheError> {
        self.vectors.delete(id).await?;
        self.artifacts.delete(id).await?;
        Ok(())
    }

    /// Mark every artifact with the given `metadata.source_url` stale, then
    /// propagate staleness to all transitive dependents through the
    /// dependency DAG. Returns the number of artifacts marked.
    ///
    /// Idempotent: already-stale artifacts are neither re-marked nor
    /// re-bumped, and contribute no propagation seeds.
    pub async fn invalidate(&self, source_url: &str) -> Result<u64, CacheError> {
        let seeds = self.artifacts.mark_stale_by_source_url(source_url).await?;
        let mut marked = seeds.len() as u64;

        let mut visited: HashSet<Uuid> = seeds.iter().copied().collect();
        let mut queue: VecDeque<Uuid> = seeds.into();

        while let Some(id) = queue.pop_front() {
            for dependent in self.artifacts.get_dependents(id).await? {
                if visited.insert(dependent) {
                    if self.artifacts.mark_stale(dependent).await? {
                        marked += 1;
                    }
                    queue.push_back(dependent);
                }
            }
        }

        if marked > 0 {
            tracing::info!(source_url, marked, "invalidated artifacts");
        }

        Ok(marked)
    }
}
