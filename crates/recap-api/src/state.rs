//! Application state shared across all route handlers.
//!
//! AppState holds the session store, the conversation engine, and the
//! external provider services. It is passed to handlers via axum's
//! State extractor; all fields use `Arc` for cheap cloning.

use std::sync::Arc;
use std::time::Instant;

use recap_chat::{ConversationEngine, DynGenerationService, SessionStore};
use recap_core::config::RecapConfig;
use recap_transcribe::DynTranscriptionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<RecapConfig>,
    /// Live session registry.
    pub store: Arc<SessionStore>,
    /// Question-answering engine over the store.
    pub engine: Arc<ConversationEngine>,
    /// Speech-to-text provider.
    pub transcriber: Arc<dyn DynTranscriptionService>,
    /// Chat-completion provider, used directly for summaries.
    pub generator: Arc<dyn DynGenerationService>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: RecapConfig,
        store: Arc<SessionStore>,
        engine: Arc<ConversationEngine>,
        transcriber: Arc<dyn DynTranscriptionService>,
        generator: Arc<dyn DynGenerationService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            engine,
            transcriber,
            generator,
            start_time: Instant::now(),
        }
    }
}
