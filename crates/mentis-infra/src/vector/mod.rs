//! Vector index adapters.
//!
//! Two implementations of the `VectorIndex` port: a Qdrant REST adapter for
//! production and an in-memory exact-scan index for tests and single-node
//! setups. `VectorStore` is the runtime-selected wrapper built from
//! configuration.

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryVectorIndex;
pub use qdrant::QdrantVectorIndex;

use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_core::vector::{VectorHit, VectorIndex};
use mentis_types::config::VectorConfig;
use mentis_types::error::VectorError;

/// Runtime-selected vector index.
#[derive(Clone)]
pub enum VectorStore {
    Qdrant(QdrantVectorIndex),
    Memory(InMemoryVectorIndex),
}

impl VectorStore {
    /// Build the configured adapter. The collection is sized to `dimension`,
    /// which must come from the embedding engine selected for this process.
    pub fn from_config(config: &VectorConfig, dimension: usize) -> Result<Self, VectorError> {
        match config.provider.as_str() {
            "qdrant" => Ok(VectorStore::Qdrant(QdrantVectorIndex::new(
                &config.qdrant,
                dimension,
            ))),
            "memory" => Ok(VectorStore::Memory(InMemoryVectorIndex::new())),
            other => Err(VectorError::Query(format!(
                "unsupported vector provider: '{other}'"
            ))),
        }
    }
}

impl VectorIndex for VectorStore {
    async fn upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> Result<(), VectorError> {
        match self {
            VectorStore::Qdrant(index) => index.upsert(id, vector, payload).await,
            VectorStore::Memory(index) => index.upsert(id, vector, payload).await,
        }
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &Map<String, Value>,
    ) -> Result<Vec<VectorHit>, VectorError> {
        match self {
            VectorStore::Qdrant(index) => index.search(query, top_k, min_score, filter).await,
            VectorStore::Memory(index) => index.search(query, top_k, min_score, filter).await,
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), VectorError> {
        match self {
            VectorStore::Qdrant(index) => index.delete(id).await,
            VectorStore::Memory(index) => index.delete(id).await,
        }
    }
}
