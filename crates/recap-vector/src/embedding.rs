//! Embedding service trait and implementations.
//!
//! - `OpenAiEmbedding` calls an OpenAI-compatible `/embeddings`
//!   endpoint over HTTP. This is the production backend.
//! - `MockEmbedding` produces deterministic bag-of-words vectors so
//!   retrieval can be tested without a network or a real model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use recap_core::error::RecapError;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors in one
/// consistent embedding space. The same service instance is used for
/// both index construction and query embedding so similarity scores
/// are comparable.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, RecapError>> + Send;

    /// Generate one embedding per input text.
    ///
    /// All-or-nothing: a failure for any input fails the whole batch.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, RecapError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// Because `EmbeddingService::embed` returns `impl Future` it is not
/// object-safe. This trait uses boxed futures instead, allowing
/// `Arc<dyn DynEmbeddingService>` to be stored in structs without
/// generics. A blanket implementation is provided so that every
/// `EmbeddingService` automatically implements `DynEmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RecapError>> + Send + 'a>,
    >;

    /// Generate one embedding per input text (boxed future).
    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>, RecapError>> + Send + 'a>,
    >;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RecapError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>, RecapError>> + Send + 'a>,
    > {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// OpenAiEmbedding - HTTP client for an OpenAI-compatible /embeddings API
// ---------------------------------------------------------------------------

/// Embedding service backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// Create a client for the given API base, key, and model.
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            // text-embedding-3-small output width.
            dimensions: 1536,
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RecapError> {
        let url = format!("{}/embeddings", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| RecapError::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecapError::Embedding(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RecapError::Embedding(format!("invalid response: {}", e)))?;

        if parsed.data.len() != inputs.len() {
            return Err(RecapError::Embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }

        debug!(count = inputs.len(), model = %self.model, "Embedded batch");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RecapError> {
        if text.is_empty() {
            return Err(RecapError::Embedding("cannot embed empty text".to_string()));
        }
        let input = [text.to_string()];
        let mut vectors = self.request(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| RecapError::Embedding("provider returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RecapError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(RecapError::Embedding("cannot embed empty text".to_string()));
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic bag-of-words vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service returning deterministic 384-dimensional
/// bag-of-words vectors.
///
/// Each lowercase word is hashed to a dimension and counted, then the
/// vector is L2-normalized. Texts that share words end up closer in
/// cosine space, which is enough structure to exercise retrieval
/// ranking in tests without a real model.
#[derive(Debug, Clone, Default)]
pub struct MockEmbedding;

const MOCK_DIMENSIONS: usize = 384;

impl MockEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn word_vector(text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; MOCK_DIMENSIONS];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let dim = (hasher.finish() as usize) % MOCK_DIMENSIONS;
            result[dim] += 1.0;
        }

        // Inputs with no alphanumeric words still get a nonzero vector
        // so cosine similarity stays defined.
        if result.iter().all(|v| *v == 0.0) {
            result[0] = 1.0;
        }

        // L2-normalize to unit length, matching real providers.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RecapError> {
        if text.is_empty() {
            return Err(RecapError::Embedding("cannot embed empty text".to_string()));
        }
        Ok(Self::word_vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RecapError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }
}
