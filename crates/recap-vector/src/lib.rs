//! Recap vector crate - transcript chunking, embedding services, and
//! the per-session vector index.
//!
//! Provides the deterministic overlapping chunker, an embedding
//! service trait with a mock implementation for testing and an
//! OpenAI-compatible HTTP implementation for production, and a
//! build-once cosine-similarity index scoped to a single session.

pub mod chunker;
pub mod embedding;
pub mod index;

pub use chunker::split;
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding, OpenAiEmbedding};
pub use index::{Passage, RetrievedPassage, VectorIndex};
