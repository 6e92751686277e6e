//! Recap chat crate - the session-scoped conversation core.
//!
//! Holds the session registry, bounded conversation memory, the
//! generation provider boundary, and the engine that answers
//! questions from a single recording's transcript: retrieve passages,
//! assemble a prompt with recent turns, stream the provider's answer,
//! and record the completed turn.

pub mod engine;
pub mod error;
pub mod generation;
pub mod memory;
pub mod openai;
pub mod session;
pub mod types;

pub use engine::{AnswerStream, ConversationEngine};
pub use error::ChatError;
pub use generation::{
    DynGenerationService, FragmentStream, GenerationRequest, GenerationService, MockGeneration,
};
pub use memory::ConversationMemory;
pub use openai::OpenAiGeneration;
pub use session::{Session, SessionStore};
pub use types::{AnswerEvent, SessionInfo, Turn};
