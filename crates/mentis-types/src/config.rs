//! Configuration structs for Mentis.
//!
//! Struct definitions only; the environment loader lives in `mentis-infra`.

use serde::{Deserialize, Serialize};

/// Top-level configuration assembled from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentisConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vector: VectorConfig,
    pub embedding: EmbeddingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Artifact store connection string (SQLite file URL).
    pub url: String,
}

/// Vector index selection and connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// One of `qdrant` or `memory`.
    pub provider: String,
    pub qdrant: QdrantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    /// API key, sent as the `api-key` header when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub use_tls: bool,
}

/// Embedding provider selection and per-provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// One of `openai`, `gemini`, `openai_compatible`, `mock`.
    pub provider: String,
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub compatible: OpenAiCompatibleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatibleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}
