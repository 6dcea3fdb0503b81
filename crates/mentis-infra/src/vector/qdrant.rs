//! Qdrant REST vector index adapter.
//!
//! Talks to Qdrant's HTTP API: collection lifecycle, point upsert/delete,
//! and filtered similarity search. The collection is created lazily on
//! first write, sized to the embedding engine's declared dimension with
//! cosine distance.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed
//! when constructing the `api-key` request header.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::OnceCell;
use uuid::Uuid;

use mentis_core::vector::{VectorHit, VectorIndex};
use mentis_types::config::QdrantConfig;
use mentis_types::error::VectorError;

/// Qdrant-backed implementation of `VectorIndex` over the REST API.
#[derive(Clone)]
pub struct QdrantVectorIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<SecretString>,
    dimension: usize,
    collection_ready: Arc<OnceCell<()>>,
}

// QdrantVectorIndex intentionally does NOT derive Debug to keep the API key
// out of Debug output.

impl QdrantVectorIndex {
    /// Create a new adapter from configuration. The collection is sized to
    /// `dimension` when it is first created.
    pub fn new(config: &QdrantConfig, dimension: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        let scheme = if config.use_tls { "https" } else { "http" };
        let base_url = format!("{scheme}://{}:{}", config.host, config.port);

        Self {
            client,
            base_url,
            collection: config.collection.clone(),
            api_key: config
                .api_key
                .as_deref()
                .map(|key| SecretString::from(key.to_string())),
            dimension,
            collection_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key.expose_secret()),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, VectorError> {
        let response = self.request(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                VectorError::Unavailable(format!("{context}: request timed out"))
            } else {
                VectorError::Unavailable(format!("{context}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                VectorError::Unavailable(format!("{context} (status {status}): {body}"))
            } else {
                VectorError::Query(format!("{context} (status {status}): {body}"))
            });
        }

        Ok(response)
    }

    /// Ensure the collection exists, creating it on first use.
    async fn ensure_collection(&self) -> Result<(), VectorError> {
        self.collection_ready
            .get_or_try_init(|| async {
                let url = self.url(&format!("/collections/{}", self.collection));
                let response = self
                    .request(self.client.get(&url))
                    .send()
                    .await
                    .map_err(|e| VectorError::Unavailable(format!("get collection: {e}")))?;

                if response.status().is_success() {
                    return Ok(());
                }
                if response.status() != reqwest::StatusCode::NOT_FOUND {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(VectorError::Unavailable(format!(
                        "get collection (status {status}): {body}"
                    )));
                }

                let create = CreateCollectionRequest {
                    vectors: VectorParams {
                        size: self.dimension,
                        distance: "Cosine",
                    },
                };
                self.send(
                    self.client.put(&url).json(&create),
                    "create collection",
                )
                .await?;

                tracing::info!(
                    collection = %self.collection,
                    dimension = self.dimension,
                    "created qdrant collection"
                );
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPointsRequest {
    points: Vec<PointStruct>,
}

#[derive(Serialize)]
struct PointStruct {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[derive(Serialize)]
struct DeletePointsRequest {
    points: Vec<String>,
}

/// Convert the port's filter map into a Qdrant `must` filter.
///
/// Only string values become match conditions; everything else is silently
/// ignored per the port contract. Returns `None` when no condition remains.
fn build_filter(filter: &Map<String, Value>) -> Option<Value> {
    let conditions: Vec<Value> = filter
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some(json!({"key": key, "match": {"value": s}})),
            _ => None,
        })
        .collect();

    if conditions.is_empty() {
        None
    } else {
        Some(json!({"must": conditions}))
    }
}

/// Qdrant point ids come back as strings or integers; only UUID strings map
/// back to artifact ids.
fn parse_point_id(id: &Value) -> Option<Uuid> {
    id.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

// ---------------------------------------------------------------------------
// VectorIndex impl
// ---------------------------------------------------------------------------

impl VectorIndex for QdrantVectorIndex {
    async fn upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> Result<(), VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        self.ensure_collection().await?;

        let body = UpsertPointsRequest {
            points: vec![PointStruct {
                id: id.to_string(),
                vector: vector.to_vec(),
                payload: payload.clone(),
            }],
        };

        let url = self.url(&format!("/collections/{}/points?wait=true", self.collection));
        self.send(self.client.put(&url).json(&body), "upsert point")
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &Map<String, Value>,
    ) -> Result<Vec<VectorHit>, VectorError> {
        self.ensure_collection().await?;

        let body = SearchRequest {
            vector: query.to_vec(),
            limit: top_k,
            score_threshold: (min_score > 0.0).then_some(min_score),
            with_payload: true,
            filter: build_filter(filter),
        };

        let url = self.url(&format!("/collections/{}/points/search", self.collection));
        let response = self
            .send(self.client.post(&url).json(&body), "search points")
            .await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| VectorError::Deserialization(e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .filter_map(|point| {
                let id = parse_point_id(&point.id)?;
                Some(VectorHit {
                    id,
                    score: point.score,
                    payload: point.payload,
                })
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), VectorError> {
        self.ensure_collection().await?;

        let body = DeletePointsRequest {
            points: vec![id.to_string()],
        };

        let url = self.url(&format!(
            "/collections/{}/points/delete?wait=true",
            self.collection
        ));
        self.send(self.client.post(&url).json(&body), "delete point")
            .await?;
        Ok(())
    }
}
