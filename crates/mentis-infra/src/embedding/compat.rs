//! OpenAI-compatible embedding provider.
//!
//! One implementation serving any endpoint that speaks the OpenAI
//! embeddings wire format -- Ollama, vLLM, LM Studio, and hosted
//! compatibles -- via a configurable base URL. The Bearer header is only
//! sent when an API key is configured (local servers usually need none).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mentis_core::embedding::EmbeddingProvider;
use mentis_types::config::OpenAiCompatibleConfig;
use mentis_types::error::EmbeddingError;

use super::{REQUEST_TIMEOUT_SECS, map_status_error, map_transport_error};

/// Provider for any OpenAI-compatible embeddings endpoint.
///
/// Does NOT derive Debug to keep the API key out of Debug output.
pub struct OpenAiCompatibleEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiCompatibleEmbeddingProvider {
    pub fn new(config: &OpenAiCompatibleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to create reqwest client");

        // Normalize the base URL to end with /v1
        let mut base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.ends_with("/v1") {
            base_url.push_str("/v1");
        }

        let api_key = if config.api_key.is_empty() {
            None
        } else {
            Some(SecretString::from(config.api_key.clone()))
        };

        Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiCompatibleEmbeddingProvider {
    async fn request_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
            encoding_format: "float",
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Deserialization(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Deserialization(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let mut embeddings = vec![Vec::new(); parsed.data.len()];
        for item in parsed.data {
            let slot = embeddings.get_mut(item.index).ok_or_else(|| {
                EmbeddingError::Deserialization(format!(
                    "embedding index {} out of range",
                    item.index
                ))
            })?;
            *slot = item.embedding;
        }

        Ok(embeddings)
    }
}

impl EmbeddingProvider for OpenAiCompatibleEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self.request_embeddings(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        // Varies by model; common families mapped by name
        let model = self.model.as_str();
        if model.contains("nomic-embed") {
            768
        } else if model.contains("all-MiniLM") {
            384
        } else if model.contains("bge-") || model.contains("e5-") {
            1024
        } else {
            1536
        }
    }
}
