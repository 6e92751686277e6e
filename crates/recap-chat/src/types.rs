//! Shared types for the conversation core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One question/answer exchange recorded in a session's memory.
///
/// Immutable once recorded; only complete answers ever become turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The question exactly as the caller asked it.
    pub question: String,
    /// The fully assembled answer text.
    pub answer: String,
    /// Epoch seconds when the turn completed.
    pub created_at: i64,
}

/// Snapshot of a session's public state for the diagnostic surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    /// Length of the stored transcript in characters.
    pub transcription_length: usize,
    /// Number of passages in the session's vector index.
    pub passage_count: usize,
    /// Number of turns currently held in conversation memory.
    pub turn_count: usize,
    /// Epoch seconds when the session was created.
    pub created_at: i64,
    /// Epoch seconds of the most recent successful lookup.
    pub last_access: i64,
}

/// One element of a streamed answer.
///
/// `Fragment`s arrive as the provider produces them; `Done` is the
/// completion marker carrying the concatenated answer, and is the
/// only event that implies a turn was recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    Fragment(String),
    Done { answer: String },
}
