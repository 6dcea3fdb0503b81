//! Environment configuration loader.
//!
//! Reads the environment (with `.env` support via dotenvy) into a
//! [`MentisConfig`], falling back to development defaults for anything
//! unset. Struct definitions live in `mentis-types`.

use mentis_types::config::{
    DatabaseConfig, EmbeddingConfig, GeminiConfig, LogConfig, MentisConfig,
    OpenAiCompatibleConfig, OpenAiConfig, QdrantConfig, ServerConfig, VectorConfig,
};

use crate::sqlite::pool::default_database_url;

/// Load configuration from the process environment.
///
/// Loads a `.env` file first when one exists; real environment variables
/// take precedence over `.env` entries.
pub fn load() -> MentisConfig {
    if dotenvy::dotenv().is_ok() {
        tracing::debug!("loaded environment from .env");
    }
    from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

/// Assemble a config from an arbitrary key lookup (testable seam).
fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MentisConfig {
    let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
    let get_parse = |key: &str, default: u16| {
        lookup(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };
    let get_bool = |key: &str, default: bool| {
        lookup(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    MentisConfig {
        server: ServerConfig {
            port: get_parse("SERVER_PORT", 8080),
        },
        database: DatabaseConfig {
            url: lookup("DATABASE_URL").unwrap_or_else(default_database_url),
        },
        vector: VectorConfig {
            provider: get("VECTOR_PROVIDER", "qdrant"),
            qdrant: QdrantConfig {
                host: get("QDRANT_HOST", "localhost"),
                port: get_parse("QDRANT_PORT", 6333),
                collection: get("QDRANT_COLLECTION", "mentis"),
                api_key: lookup("QDRANT_API_KEY"),
                use_tls: get_bool("QDRANT_USE_TLS", false),
            },
        },
        embedding: EmbeddingConfig {
            provider: get("EMBEDDING_PROVIDER", "mock"),
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY", ""),
                model: get("OPENAI_MODEL", "text-embedding-3-small"),
            },
            gemini: GeminiConfig {
                api_key: get("GEMINI_API_KEY", ""),
                model: get("GEMINI_MODEL", "text-embedding-004"),
            },
            compatible: OpenAiCompatibleConfig {
                base_url: get("EMBEDDING_BASE_URL", "http://localhost:11434/v1"),
                api_key: get("EMBEDDING_API_KEY", ""),
                model: get("EMBEDDING_MODEL", "nomic-embed-text"),
            },
        },
        log: LogConfig {
            level: get("LOG_LEVEL", "info"),
        },
    }
}
