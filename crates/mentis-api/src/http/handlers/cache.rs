//! Cache handlers: publish, lookup, retrieval, deletion, invalidation.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use mentis_types::artifact::{
    Artifact, ArtifactType, InvalidateRequest, LookupOptions, LookupRequest, LookupResponse,
    PublishRequest, PublishResponse,
};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /v1/cache/publish - Publish a batch of artifacts.
pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, AppError> {
    let response = state.cache.publish(req.objects).await?;
    Ok(Json(response))
}

/// POST /v1/cache/lookup - Semantic lookup by query text.
pub async fn lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<LookupResponse>, AppError> {
    let response = state.cache.lookup(req.options).await?;
    Ok(Json(response))
}

/// GET /v1/cache/artifacts/{id} - Fetch one artifact.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Artifact>, AppError> {
    let artifact = state
        .cache
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("artifact not found".to_string()))?;
    Ok(Json(artifact))
}

/// DELETE /v1/cache/artifacts/{id} - Delete an artifact and its vector.
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.cache.delete(id).await?;
    Ok(Json(json!({"message": "artifact deleted"})))
}

/// POST /v1/cache/invalidate - Mark artifacts stale by source URL.
pub async fn invalidate(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<Value>, AppError> {
    if req.source_url.is_empty() {
        return Err(AppError::Validation("source_url is required".to_string()));
    }
    let marked = state.cache.invalidate(&req.source_url).await?;
    Ok(Json(json!({"message": "artifacts invalidated", "marked": marked})))
}

/// Query parameters for the GET quick-lookup endpoint.
#[derive(Debug, Deserialize)]
pub struct QuickLookupQuery {
    pub q: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(rename = "type")]
    pub artifact_type: Option<ArtifactType>,
    #[serde(default)]
    pub include_stale: bool,
    #[serde(default)]
    pub include_content: bool,
    #[serde(default)]
    pub include_embedding: bool,
}

fn default_top_k() -> usize {
    10
}

fn default_min_score() -> f32 {
    0.85
}

/// GET /v1/lookup - Quick lookup via query string.
pub async fn quick_lookup(
    State(state): State<AppState>,
    Query(query): Query<QuickLookupQuery>,
) -> Result<Json<LookupResponse>, AppError> {
    if query.q.is_empty() {
        return Err(AppError::Validation(
            "query parameter 'q' is required".to_string(),
        ));
    }

    let options = LookupOptions {
        query: query.q,
        top_k: query.top_k,
        min_score: query.min_score,
        artifact_type: query.artifact_type,
        include_stale: query.include_stale,
        include_content: query.include_content,
        include_embedding: query.include_embedding,
    };

    let response = state.cache.lookup(options).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_lookup_query_defaults() {
        let query: QuickLookupQuery =
            serde_urlencoded::from_str("q=alpha").expect("minimal query should parse");
        assert_eq!(query.q, "alpha");
        assert_eq!(query.top_k, 10);
        assert!((query.min_score - 0.85).abs() < f32::EPSILON);
        assert!(query.artifact_type.is_none());
        assert!(!query.include_stale);
    }

    #[test]
    fn test_quick_lookup_query_full() {
        let query: QuickLookupQuery = serde_urlencoded::from_str(
            "q=alpha&top_k=3&min_score=0.5&type=RAW&include_stale=true&include_content=true",
        )
        .expect("full query should parse");
        assert_eq!(query.top_k, 3);
        assert_eq!(query.artifact_type, Some(ArtifactType::Raw));
        assert!(query.include_stale);
        assert!(query.include_content);
        assert!(!query.include_embedding);
    }
}
