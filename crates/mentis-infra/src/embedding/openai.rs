//! OpenAI embedding provider.
//!
//! Calls the `/v1/embeddings` endpoint with Bearer authentication. Batch
//! requests send all texts in one call; the response is re-ordered by the
//! per-item index before being returned.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mentis_core::embedding::EmbeddingProvider;
use mentis_types::config::OpenAiConfig;
use mentis_types::error::EmbeddingError;

use super::{REQUEST_TIMEOUT_SECS, map_status_error, map_transport_error};

/// OpenAI-backed implementation of `EmbeddingProvider`.
///
/// Does NOT derive Debug to keep the API key out of Debug output.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key: SecretString::from(config.api_key.clone()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: config.model.clone(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn request_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

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

        // Re-order by the per-item index the API reports
        let mut embeddings = vec![Vec::new(); parsed.data.len()];
        for item in parsed.data {
            let slot = embeddings
                .get_mut(item.index)
                .ok_or_else(|| {
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

impl EmbeddingProvider for OpenAiEmbeddingProvider {
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
        match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }
}
