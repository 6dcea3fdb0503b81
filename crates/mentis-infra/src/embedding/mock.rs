//! Deterministic mock embedding provider.
//!
//! Produces a 1536-dimensional unit vector computed from normalized text
//! characteristics and SHA-256 bytes. Equal inputs always yield equal
//! vectors; similar inputs are NOT required to yield similar vectors. Used
//! for tests and offline development.

use sha2::{Digest, Sha256};

use mentis_core::embedding::{EmbeddingProvider, l2_normalize};
use mentis_types::error::EmbeddingError;

const EMBEDDING_SIZE: usize = 1536;

#[derive(Default)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    fn create_embedding(&self, text: &str) -> Vec<f32> {
        // Normalize text
        let text = text.trim().to_lowercase();
        let bytes = text.as_bytes();

        // Hash for deterministic results
        let hash = Sha256::digest(bytes);

        let word_count = text.split_whitespace().count();

        let mut embedding = vec![0.0_f32; EMBEDDING_SIZE];
        for (i, slot) in embedding.iter_mut().enumerate() {
            // Combine hash bytes with text characteristics
            let hash_index = i % hash.len();
            let mut value = f64::from(hash[hash_index]) / 255.0;

            if i < bytes.len() {
                value += f64::from(bytes[i % bytes.len()]) / 255.0;
            }

            value += word_count as f64 / 1000.0;
            value += (i as f64 * 0.1).sin();

            // Shift into the [-1, 1] range
            value = (value - 1.0) / 2.0;

            *slot = value as f32;
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.create_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.create_embedding(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        EMBEDDING_SIZE
    }
}
