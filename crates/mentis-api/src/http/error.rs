//! Application error type mapping service errors to HTTP status codes.
//!
//! The service errors carry a kind; this mapping preserves it: validation
//! failures are 400, absent entities 404, conflicts 409, embedding provider
//! failures 502, vector index unavailability 503, everything else 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mentis_types::error::{CacheError, EmbeddingError, RepositoryError, VectorError, WorkflowError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Cache(CacheError),
    Workflow(WorkflowError),
    Validation(String),
    NotFound(String),
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

fn repository_status(e: &RepositoryError) -> StatusCode {
    match e {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn vector_status(e: &VectorError) -> StatusCode {
    match e {
        VectorError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn embedding_status(e: &EmbeddingError) -> StatusCode {
    match e {
        EmbeddingError::RateLimited | EmbeddingError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Cache(e) => {
                let status = match e {
                    CacheError::Validation(_) => StatusCode::BAD_REQUEST,
                    CacheError::NotFound => StatusCode::NOT_FOUND,
                    CacheError::Repository(inner) => repository_status(inner),
                    CacheError::Vector(inner) => vector_status(inner),
                    CacheError::Embedding(inner) => embedding_status(inner),
                };
                (status, e.to_string())
            }
            AppError::Workflow(e) => {
                let status = match e {
                    WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                    WorkflowError::SessionNotFound => StatusCode::NOT_FOUND,
                    WorkflowError::Processor(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    WorkflowError::Repository(inner) => repository_status(inner),
                    WorkflowError::Vector(inner) => vector_status(inner),
                    WorkflowError::Embedding(inner) => embedding_status(inner),
                };
                (status, e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }
        (status, axum::Json(json!({"error": message}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let (status, _) = AppError::Validation("bad id".to_string()).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let (status, _) =
            AppError::Workflow(WorkflowError::SessionNotFound).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = AppError::Cache(CacheError::NotFound).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = AppError::Cache(CacheError::Repository(RepositoryError::Conflict(
            "duplicate".to_string(),
        )));
        let (status, _) = err.status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_embedding_errors_map_to_upstream_statuses() {
        let err = AppError::Cache(CacheError::Embedding(EmbeddingError::AuthenticationFailed));
        assert_eq!(err.status_and_message().0, StatusCode::BAD_GATEWAY);

        let err = AppError::Cache(CacheError::Embedding(EmbeddingError::RateLimited));
        assert_eq!(err.status_and_message().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_vector_unavailable_maps_to_503() {
        let err = AppError::Workflow(WorkflowError::Vector(VectorError::Unavailable(
            "connection refused".to_string(),
        )));
        assert_eq!(err.status_and_message().0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
