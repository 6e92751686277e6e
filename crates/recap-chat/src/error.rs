//! Error types for the conversation core.

use recap_core::error::RecapError;

/// Errors from session management and question answering.
///
/// `SessionNotFound`, `SessionBusy`, and `GenerationFailed` are kept
/// distinct so a client can decide between "start over", "wait", and
/// "retry the question".
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transcription is empty")]
    EmptyTranscript,
    #[error("question cannot be empty")]
    InvalidQuestion,
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("session is answering another question: {0}")]
    SessionBusy(uuid::Uuid),
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RecapError> for ChatError {
    fn from(err: RecapError) -> Self {
        match err {
            RecapError::Embedding(msg) => ChatError::EmbeddingUnavailable(msg),
            RecapError::Generation(msg) => ChatError::GenerationFailed(msg),
            other => ChatError::Internal(other.to_string()),
        }
    }
}
