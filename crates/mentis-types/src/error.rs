//! Error types for Mentis.
//!
//! Errors carry a kind, not just a message: validation failures are never
//! retried, absent entities are `Ok(None)` at the repository layer and
//! explicit NotFound at the service layer, uniqueness violations downgrade to
//! skip/cached-return where the contract allows, and upstream unavailability
//! is surfaced for the caller to decide on retries. Service errors wrap
//! lower-level errors via `#[from]` so the original kind survives to the
//! transport mapping.

use thiserror::Error;

/// Errors from repository operations (used by trait definitions in mentis-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Errors from the vector index.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("vector query error: {0}")]
    Query(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to decode vector index response: {0}")]
    Deserialization(String),
}

/// Errors from embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{0} API key is required")]
    MissingApiKey(&'static str),

    #[error("embedding provider authentication failed")]
    AuthenticationFailed,

    #[error("embedding provider rate limited")]
    RateLimited,

    #[error("embedding provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("embedding request timed out")]
    Timeout,

    #[error("failed to decode embedding response: {0}")]
    Deserialization(String),

    #[error("embedding provider returned no embeddings")]
    EmptyResponse,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unsupported embedding provider: '{0}'")]
    UnsupportedProvider(String),
}

/// Errors from the cache service.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("artifact not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Errors from the workflow service.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("step processor error: {0}")]
    Processor(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
