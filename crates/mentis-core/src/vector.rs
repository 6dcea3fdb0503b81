//! Vector index port.
//!
//! Approximate nearest-neighbour search over artifact embeddings with
//! metadata filter pushdown. Implementations (Qdrant REST, in-memory) live
//! in mentis-infra.

use std::future::Future;

use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_types::error::VectorError;

/// A single search hit: the point id (artifact id), cosine similarity score,
/// and the payload stored alongside the vector.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// Trait for vector storage with cosine similarity search.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
///
/// Point identity matches the artifact id, and the payload mirrors the
/// artifact's filterable metadata. The collection is created lazily on first
/// write, sized to the embedding engine's declared dimension with cosine
/// distance; changing the dimension mid-life is not supported.
pub trait VectorIndex: Send + Sync {
    /// Write (or overwrite) a point.
    fn upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), VectorError>> + Send;

    /// Search for the `top_k` nearest points by cosine similarity.
    ///
    /// Only points with score >= `min_score` are returned, descending by
    /// score. The filter is a logical AND of equality matches on string
    /// payload fields; non-string filter values are silently ignored.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &Map<String, Value>,
    ) -> impl Future<Output = Result<Vec<VectorHit>, VectorError>> + Send;

    /// Remove a point. Removing an absent point is not an error.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), VectorError>> + Send;

    /// Alias for [`VectorIndex::upsert`].
    fn update(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), VectorError>> + Send {
        self.upsert(id, vector, payload)
    }
}
