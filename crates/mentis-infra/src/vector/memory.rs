//! In-memory vector index with exact cosine scan.
//!
//! Backs tests and single-node setups where running Qdrant is not worth it.
//! Filter semantics match the port contract exactly: logical AND of equality
//! matches on string payload fields, non-string filter values silently
//! ignored.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_core::vector::{VectorHit, VectorIndex};
use mentis_types::error::VectorError;

#[derive(Clone, Default)]
pub struct InMemoryVectorIndex {
    points: Arc<RwLock<HashMap<Uuid, StoredPoint>>>,
}

struct StoredPoint {
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points currently stored.
    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// AND of equality matches on string payload fields. Non-string filter
/// values do not constrain the match.
fn matches_filter(payload: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Value::String(s) => payload.get(key).and_then(Value::as_str) == Some(s.as_str()),
        _ => true,
    })
}

impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> Result<(), VectorError> {
        self.points.write().unwrap().insert(
            id,
            StoredPoint {
                vector: vector.to_vec(),
                payload: payload.clone(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &Map<String, Value>,
    ) -> Result<Vec<VectorHit>, VectorError> {
        let points = self.points.read().unwrap();

        let mut hits: Vec<VectorHit> = points
            .iter()
            .filter(|(_, point)| matches_filter(&point.payload, filter))
            .map(|(id, point)| VectorHit {
                id: *id,
                score: cosine_similarity(query, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<(), VectorError> {
        self.points.write().unwrap().remove(&id);
        Ok(())
    }
}
