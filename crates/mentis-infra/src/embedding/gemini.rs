//! Google Gemini embedding provider.
//!
//! Calls `models/{model}:embedContent` with key-in-query authentication.
//! The API has no batch endpoint, so batches are sequential per-text
//! requests; the first failure fails the whole batch.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mentis_core::embedding::EmbeddingProvider;
use mentis_types::config::GeminiConfig;
use mentis_types::error::EmbeddingError;

use super::{REQUEST_TIMEOUT_SECS, map_status_error, map_transport_error};

/// Gemini-backed implementation of `EmbeddingProvider`.
///
/// Does NOT derive Debug: the API key travels in the URL, so neither the
/// key nor built URLs may reach Debug output or logs.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: &GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key: SecretString::from(config.api_key.clone()),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url,
            self.model,
            self.api_key.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), body));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Deserialization(e.to_string()))?;

        if parsed.embedding.values.is_empty() {
            return Err(EmbeddingError::EmptyResponse);
        }
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-004" => 768,
            "embedding-001" => 768,
            _ => 768,
        }
    }
}
