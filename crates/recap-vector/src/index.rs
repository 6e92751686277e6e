//! Per-session vector index with brute-force cosine similarity search.
//!
//! One index is built per session from the transcript chunks and never
//! modified afterward, so the structure is a plain ordered vector of
//! passages. Search is O(n), which is fine for a single recording.

use std::sync::Arc;

use tracing::debug;

use recap_core::error::Result;

use crate::embedding::DynEmbeddingService;

/// An immutable chunk of transcript text plus its embedding.
#[derive(Debug, Clone)]
pub struct Passage {
    /// Chunk text as produced by the chunker.
    pub text: String,
    /// Embedding vector from the external provider.
    pub embedding: Vec<f32>,
    /// Zero-based position of the chunk in the original transcript.
    pub position: usize,
}

/// A passage returned from a similarity query.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    /// Chunk text.
    pub text: String,
    /// Cosine similarity to the query.
    pub score: f64,
    /// Original chunk position, for stable ordering and display.
    pub position: usize,
}

/// Read-only similarity index over one session's transcript chunks.
///
/// Built once with `build`; the same embedding service is retained so
/// that queries land in the same vector space as the passages.
pub struct VectorIndex {
    passages: Vec<Passage>,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("passages", &self.passages.len())
            .field("dimensions", &self.embedder.dimensions())
            .finish()
    }
}

impl VectorIndex {
    /// Build an index from transcript chunks.
    ///
    /// All-or-nothing: if the embedding provider fails for the batch,
    /// no index is returned and nothing is retained.
    pub async fn build(
        embedder: Arc<dyn DynEmbeddingService>,
        chunks: Vec<String>,
    ) -> Result<Self> {
        let embeddings = embedder.embed_batch_boxed(&chunks).await?;

        let passages = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(position, (text, embedding))| Passage {
                text,
                embedding,
                position,
            })
            .collect::<Vec<_>>();

        debug!(passages = passages.len(), "Vector index built");
        Ok(Self { passages, embedder })
    }

    /// Return up to `k` passages most similar to `text`, best first.
    ///
    /// Equal scores keep original chunk order (the sort is stable).
    /// Fewer than `k` passages returns all of them; an empty index
    /// returns an empty list rather than an error.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        if self.passages.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_boxed(text).await?;

        let mut scored: Vec<RetrievedPassage> = self
            .passages
            .iter()
            .map(|p| RetrievedPassage {
                text: p.text.clone(),
                score: cosine_similarity(&query_vec, &p.embedding),
                position: p.position,
            })
            .collect();

        // Stable sort: ties preserve chunk order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Number of passages in the index.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// True if the index holds no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
