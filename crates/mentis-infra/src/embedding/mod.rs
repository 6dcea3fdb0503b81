//! Embedding provider implementations.
//!
//! Four providers behind one factory: `openai`, `gemini`,
//! `openai_compatible` (Ollama, vLLM, and friends), and `mock` for tests
//! and offline development. The provider is selected once at startup;
//! remote providers carry a fixed 30-second request deadline and keep their
//! API keys in `secrecy::SecretString`.

pub mod compat;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use compat::OpenAiCompatibleEmbeddingProvider;
pub use gemini::GeminiEmbeddingProvider;
pub use mock::MockEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use mentis_core::embedding::BoxEmbeddingProvider;
use mentis_types::config::EmbeddingConfig;
use mentis_types::error::EmbeddingError;

/// Shared request deadline for remote embedding calls.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the configured embedding provider, type-erased for the engine.
pub fn build_provider(config: &EmbeddingConfig) -> Result<BoxEmbeddingProvider, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => {
            if config.openai.api_key.is_empty() {
                return Err(EmbeddingError::MissingApiKey("OpenAI"));
            }
            Ok(BoxEmbeddingProvider::new(OpenAiEmbeddingProvider::new(
                &config.openai,
            )))
        }
        "gemini" => {
            if config.gemini.api_key.is_empty() {
                return Err(EmbeddingError::MissingApiKey("Gemini"));
            }
            Ok(BoxEmbeddingProvider::new(GeminiEmbeddingProvider::new(
                &config.gemini,
            )))
        }
        "openai_compatible" => {
            if config.compatible.base_url.is_empty() {
                return Err(EmbeddingError::UnsupportedProvider(
                    "openai_compatible requires a base URL".to_string(),
                ));
            }
            Ok(BoxEmbeddingProvider::new(
                OpenAiCompatibleEmbeddingProvider::new(&config.compatible),
            ))
        }
        "mock" => Ok(BoxEmbeddingProvider::new(MockEmbeddingProvider::new())),
        other => Err(EmbeddingError::UnsupportedProvider(other.to_string())),
    }
}

/// Map a reqwest transport error to the embedding error taxonomy.
pub(crate) fn map_transport_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::Provider {
            status: 0,
            message: format!("HTTP request failed: {e}"),
        }
    }
}

/// Map a non-success HTTP status to the embedding error taxonomy.
pub(crate) fn map_status_error(status: u16, body: String) -> EmbeddingError {
    match status {
        401 | 403 => EmbeddingError::AuthenticationFailed,
        429 => EmbeddingError::RateLimited,
        _ => EmbeddingError::Provider {
            status,
            message: body,
        },
    }
}
