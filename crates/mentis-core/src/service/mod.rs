//! Policy services composing the lower layers.
//!
//! The cache service composes the artifact store, vector index, hasher, and
//! embedding engine; the workflow service adds the step index and step
//! processors on top.

pub mod cache;
pub mod workflow;

pub use cache::CacheService;
pub use workflow::WorkflowService;

use serde_json::{Map, Value};

use mentis_types::artifact::Artifact;

/// Build the vector payload for an artifact: its metadata plus the
/// filterable `type` and `stale` fields.
///
/// Only string values participate in filter pushdown; `stale` rides along as
/// a boolean and is enforced at enrichment time instead.
pub(crate) fn vector_payload(artifact: &Artifact) -> Map<String, Value> {
    let mut payload = artifact.metadata.clone();
    payload.insert(
        "type".to_string(),
        Value::String(artifact.artifact_type.as_str().to_string()),
    );
    payload.insert("stale".to_string(), Value::Bool(artifact.stale));
    payload
}
