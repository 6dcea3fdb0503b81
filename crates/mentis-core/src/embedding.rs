//! Embedding provider port and the renormalizing engine.
//!
//! Defines the interface for converting text into fixed-dimension vectors.
//! Implementations (OpenAI, Gemini, OpenAI-compatible, mock) live in
//! `mentis-infra`. The provider is selected once at startup; it is never
//! switched mid-life because the vector collection is sized to the declared
//! dimension at creation.

use std::future::Future;
use std::pin::Pin;

use mentis_types::error::EmbeddingError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in mentis-infra.
///
/// The contract is referentially transparent for a fixed
/// `(provider, model, text)` triple -- callers may memoize.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a vector.
    fn embed(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Embed a batch of texts, preserving order and length.
    ///
    /// A failure for any element fails the whole batch.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// The model name used for embeddings (e.g., "text-embedding-3-small").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors. Constant for a process
    /// lifetime; governs the vector collection size.
    fn dimension(&self) -> usize;
}

/// Object-safe version of [`EmbeddingProvider`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch; a blanket
/// implementation is provided for all types implementing `EmbeddingProvider`.
pub trait EmbeddingProviderDyn: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>>;

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;
}

impl<T: EmbeddingProvider> EmbeddingProviderDyn for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>> {
        Box::pin(self.embed_batch(texts))
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }

    fn dimension_dyn(&self) -> usize {
        self.dimension()
    }
}

/// Type-erased embedding provider for runtime selection.
///
/// Since `EmbeddingProvider` uses RPITIT it cannot be used as a trait object
/// directly; `BoxEmbeddingProvider` delegates through [`EmbeddingProviderDyn`].
pub struct BoxEmbeddingProvider {
    inner: Box<dyn EmbeddingProviderDyn>,
}

impl BoxEmbeddingProvider {
    /// Wrap a concrete provider in a type-erased box.
    pub fn new<T: EmbeddingProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }
}

impl EmbeddingProvider for BoxEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed_boxed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.inner.embed_batch_boxed(texts).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }
}

/// The embedding engine handed to services.
///
/// Wraps the selected provider and enforces the engine contract: every
/// vector leaving the engine has the declared dimension and unit L2 norm.
/// Cosine scoring downstream never sees a non-unit vector regardless of
/// provider behavior.
pub struct EmbeddingEngine {
    provider: BoxEmbeddingProvider,
}

impl EmbeddingEngine {
    pub fn new(provider: BoxEmbeddingProvider) -> Self {
        Self { provider }
    }

    /// Embed a single text, validated and unit-normalized.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = self.provider.embed(text).await?;
        self.check_dimension(&vector)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Embed a batch of texts, each validated and unit-normalized.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = self.provider.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Deserialization(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for vector in &mut vectors {
            self.check_dimension(vector)?;
            l2_normalize(vector);
        }
        Ok(vectors)
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        let expected = self.provider.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
