//! Artifact repository trait definition.
//!
//! Durable storage for the artifact model: typed records, dependency DAG
//! edges, and staleness marking. Dependency edges are a separate adjacency
//! relation keyed on `(parent_id, child_id)` -- an edge means the child was
//! derived from the parent -- so reverse queries stay indexed.

use std::future::Future;

use uuid::Uuid;

use mentis_types::artifact::Artifact;
use mentis_types::error::RepositoryError;

/// Repository trait for artifact persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ArtifactRepository: Send + Sync {
    /// Upsert an artifact by id. On a conflicting id, type, content hash,
    /// content, metadata, `updated_at`, and `stale` are replaced.
    ///
    /// The store refuses artifacts whose `content_hash` does not match
    /// their content bytes.
    fn store(
        &self,
        artifact: &Artifact,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an artifact by its id.
    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Artifact>, RepositoryError>> + Send;

    /// Get an artifact by its content hash (publish-time dedup probe).
    fn get_by_content_hash(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Option<Artifact>, RepositoryError>> + Send;

    /// List artifacts ordered by `created_at` descending.
    fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<Artifact>, RepositoryError>> + Send;

    /// Update an existing artifact in place.
    fn update(
        &self,
        artifact: &Artifact,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete an artifact. Dependency edges referencing it are removed with
    /// it; deleting an absent artifact is a no-op.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Idempotently insert a dependency edge: `child_id` was derived from
    /// `parent_id`. Both artifacts must already exist.
    fn store_dependency(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// The parents this artifact was derived from.
    fn get_dependencies(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send;

    /// The children derived from this artifact (reverse edges).
    fn get_dependents(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send;

    /// Mark one artifact stale, bumping `updated_at`. Returns `true` when
    /// the artifact was newly marked; already-stale artifacts are untouched
    /// so repeated invalidation does not re-bump `updated_at`.
    fn mark_stale(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark every non-stale artifact whose `metadata.source_url` equals the
    /// given URL. Returns the ids that were newly marked, used as seeds for
    /// staleness propagation through the dependency DAG.
    fn mark_stale_by_source_url(
        &self,
        source_url: &str,
    ) -> impl Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send;
}
