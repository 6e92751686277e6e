//! The conversation engine: retrieval-augmented question answering
//! over one session's transcript.
//!
//! `ask` validates the question, claims the session, retrieves the
//! most relevant passages, assembles a prompt with the recent turns,
//! and streams the provider's answer. The completed turn is recorded
//! only when the stream finishes naturally; failed or abandoned
//! answers leave memory untouched.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use recap_core::config::RecapConfig;

use crate::error::ChatError;
use crate::generation::{DynGenerationService, FragmentStream, GenerationRequest};
use crate::session::{Session, SessionStore};
use crate::types::{AnswerEvent, Turn};

/// Streamed answer: zero or more fragments, then `Done` with the
/// assembled text, or a single error after which nothing follows.
pub type AnswerStream = ReceiverStream<Result<AnswerEvent, ChatError>>;

/// Answers questions against sessions in a [`SessionStore`].
pub struct ConversationEngine {
    store: Arc<SessionStore>,
    generator: Arc<dyn DynGenerationService>,
    top_k: usize,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<SessionStore>,
        generator: Arc<dyn DynGenerationService>,
        config: &RecapConfig,
    ) -> Self {
        Self {
            store,
            generator,
            top_k: config.retrieval.top_k,
        }
    }

    /// Ask a question against a session and stream the answer.
    ///
    /// Fails fast (before any fragment) on a blank question, an
    /// unknown or expired session, a busy session, or a provider
    /// error at call setup. Once the stream is returned, the only
    /// remaining failure is an error item that ends it.
    ///
    /// Dropping the returned stream cancels the answer; no turn is
    /// recorded for a cancelled or failed answer.
    pub async fn ask(&self, session_id: Uuid, question: &str) -> Result<AnswerStream, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::InvalidQuestion);
        }

        let session = self.store.get(session_id)?;
        let claim = session.try_claim()?;

        let retrieved = session.index().query(question, self.top_k).await?;
        debug!(
            session_id = %session_id,
            passages = retrieved.len(),
            "Retrieved passages for question"
        );
        let passages: Vec<String> = retrieved.into_iter().map(|p| p.text).collect();
        let history = session.recent_turns();

        let request = GenerationRequest::answer(passages, history, question);
        let fragments = self.generator.generate_boxed(request).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(forward_answer(
            session,
            claim,
            question.to_string(),
            fragments,
            tx,
        ));

        Ok(ReceiverStream::new(rx))
    }

    /// The store this engine answers against.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

/// Drive the provider stream to completion, forwarding fragments.
///
/// Holds the session claim for its whole run, so the session stays
/// busy until the answer completes, fails, or is abandoned. A failed
/// send means the caller dropped the stream; the provider stream is
/// dropped in turn, which cancels the underlying call.
async fn forward_answer(
    session: Arc<Session>,
    _claim: tokio::sync::OwnedMutexGuard<()>,
    question: String,
    mut fragments: FragmentStream,
    tx: mpsc::Sender<Result<AnswerEvent, ChatError>>,
) {
    let mut answer = String::new();

    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => {
                answer.push_str(&text);
                if tx.send(Ok(AnswerEvent::Fragment(text))).await.is_err() {
                    debug!(session_id = %session.id, "Answer abandoned by caller");
                    return;
                }
            }
            Err(e) => {
                warn!(session_id = %session.id, "Generation failed mid-stream: {}", e);
                let _ = tx.send(Err(ChatError::from(e))).await;
                return;
            }
        }
    }

    session.append_turn(Turn {
        question,
        answer: answer.clone(),
        created_at: chrono::Utc::now().timestamp(),
    });
    let _ = tx.send(Ok(AnswerEvent::Done { answer })).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use recap_core::error::RecapError;
    use recap_vector::embedding::MockEmbedding;

    use crate::generation::{GenerationService, MockGeneration};

    const TRANSCRIPT: &str = "The cat sat on the mat. The dog ran in the park.";

    fn make_store(adjust: impl FnOnce(&mut RecapConfig)) -> (Arc<SessionStore>, RecapConfig) {
        let mut config = RecapConfig::default();
        // One sentence per chunk, no overlap.
        config.chunking.chunk_size = 24;
        config.chunking.overlap = 0;
        config.retrieval.top_k = 1;
        adjust(&mut config);
        let store = Arc::new(SessionStore::new(Arc::new(MockEmbedding::new()), &config));
        (store, config)
    }

    fn make_engine(generator: Arc<dyn DynGenerationService>) -> (ConversationEngine, Arc<SessionStore>) {
        let (store, config) = make_store(|_| {});
        let engine = ConversationEngine::new(Arc::clone(&store), generator, &config);
        (engine, store)
    }

    async fn collect_answer(mut stream: AnswerStream) -> (Vec<String>, String) {
        let mut fragments = Vec::new();
        let mut done = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                AnswerEvent::Fragment(text) => fragments.push(text),
                AnswerEvent::Done { answer } => done = Some(answer),
            }
        }
        (fragments, done.expect("stream ended without Done"))
    }

    // ---- Test doubles ----

    /// Records every request it receives, answers with one fragment.
    #[derive(Clone, Default)]
    struct RecordingGeneration {
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    impl GenerationService for RecordingGeneration {
        async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, RecapError> {
            self.requests.lock().unwrap().push(request);
            let fragments: Vec<Result<String, RecapError>> =
                vec![Ok("recorded answer".to_string())];
            Ok(Box::pin(futures::stream::iter(fragments)))
        }
    }

    /// Yields two fragments, then fails.
    struct FailingMidStream;

    impl GenerationService for FailingMidStream {
        async fn generate(&self, _request: GenerationRequest) -> Result<FragmentStream, RecapError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("partial ".to_string()),
                Ok("answer".to_string()),
                Err(RecapError::Generation("connection reset".to_string())),
            ])))
        }
    }

    /// Fails before producing any stream.
    struct FailingAtCall;

    impl GenerationService for FailingAtCall {
        async fn generate(&self, _request: GenerationRequest) -> Result<FragmentStream, RecapError> {
            Err(RecapError::Generation("provider down".to_string()))
        }
    }

    /// Sleeps between fragments so callers can observe a busy session.
    struct SlowGeneration;

    impl GenerationService for SlowGeneration {
        async fn generate(&self, _request: GenerationRequest) -> Result<FragmentStream, RecapError> {
            let stream = futures::stream::iter(vec!["slow ", "answer ", "text ", "here"])
                .then(|piece| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<String, RecapError>(piece.to_string())
                });
            Ok(Box::pin(stream))
        }
    }

    // ---- Happy path ----

    #[tokio::test]
    async fn test_ask_streams_fragments_then_done() {
        let (engine, store) = make_engine(Arc::new(MockGeneration::new()));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let stream = engine.ask(id, "Where did the cat sit?").await.unwrap();
        let (fragments, answer) = collect_answer(stream).await;

        assert!(fragments.len() > 1);
        assert_eq!(fragments.concat(), answer);
        // Retrieval picked the cat sentence, not the dog sentence.
        assert!(answer.contains("cat"));
        assert!(!answer.contains("dog"));
    }

    #[tokio::test]
    async fn test_completed_answer_is_recorded() {
        let (engine, store) = make_engine(Arc::new(MockGeneration::new()));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let stream = engine.ask(id, "Where did the cat sit?").await.unwrap();
        let (_, answer) = collect_answer(stream).await;

        let turns = store.get(id).unwrap().recent_turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].question, "Where did the cat sit?");
        assert_eq!(turns[0].answer, answer);
    }

    #[tokio::test]
    async fn test_history_flows_into_next_request() {
        let recorder = RecordingGeneration::default();
        let (engine, store) = make_engine(Arc::new(recorder.clone()));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let stream = engine.ask(id, "first question").await.unwrap();
        collect_answer(stream).await;
        let stream = engine.ask(id, "second question").await.unwrap();
        collect_answer(stream).await;

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[1].history.len(), 1);
        assert_eq!(requests[1].history[0].question, "first question");
        assert_eq!(requests[1].history[0].answer, "recorded answer");
    }

    #[tokio::test]
    async fn test_question_is_trimmed() {
        let recorder = RecordingGeneration::default();
        let (engine, store) = make_engine(Arc::new(recorder.clone()));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let stream = engine.ask(id, "  padded question  ").await.unwrap();
        collect_answer(stream).await;

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].question, "padded question");
    }

    // ---- Fast failures ----

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let (engine, store) = make_engine(Arc::new(MockGeneration::new()));
        let id = store.create(TRANSCRIPT).await.unwrap();

        assert!(matches!(
            engine.ask(id, "").await,
            Err(ChatError::InvalidQuestion)
        ));
        assert!(matches!(
            engine.ask(id, "   \n ").await,
            Err(ChatError::InvalidQuestion)
        ));

        // A rejected question never touches conversation memory.
        assert!(store.get(id).unwrap().recent_turns().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let (engine, _store) = make_engine(Arc::new(MockGeneration::new()));
        assert!(matches!(
            engine.ask(Uuid::new_v4(), "question").await,
            Err(ChatError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_at_call_setup() {
        let (engine, store) = make_engine(Arc::new(FailingAtCall));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let err = engine.ask(id, "question").await.unwrap_err();
        assert!(matches!(err, ChatError::GenerationFailed(_)));

        // The claim was released; the session is immediately usable.
        assert!(store.get(id).unwrap().try_claim().is_ok());
    }

    // ---- Mid-stream failure ----

    #[tokio::test]
    async fn test_mid_stream_failure_records_no_turn() {
        let (engine, store) = make_engine(Arc::new(FailingMidStream));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let mut stream = engine.ask(id, "question").await.unwrap();
        let mut saw_error = false;
        let mut fragment_count = 0;
        while let Some(event) = stream.next().await {
            match event {
                Ok(AnswerEvent::Fragment(_)) => fragment_count += 1,
                Ok(AnswerEvent::Done { .. }) => panic!("failed stream must not complete"),
                Err(e) => {
                    assert!(matches!(e, ChatError::GenerationFailed(_)));
                    saw_error = true;
                }
            }
        }
        assert_eq!(fragment_count, 2);
        assert!(saw_error);

        let session = store.get(id).unwrap();
        assert!(session.recent_turns().is_empty());
        // The session accepts a new question after the failure.
        assert!(engine.ask(id, "again").await.is_ok());
    }

    // ---- Concurrency ----

    #[tokio::test]
    async fn test_second_question_while_busy_is_rejected() {
        let (engine, store) = make_engine(Arc::new(SlowGeneration));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let stream = engine.ask(id, "first").await.unwrap();
        assert!(matches!(
            engine.ask(id, "second").await,
            Err(ChatError::SessionBusy(busy)) if busy == id
        ));

        // Finishing the first answer frees the session.
        collect_answer(stream).await;
        assert!(engine.ask(id, "third").await.is_ok());
    }

    #[tokio::test]
    async fn test_busy_session_does_not_block_others() {
        let (engine, store) = make_engine(Arc::new(SlowGeneration));
        let a = store.create("transcript for the first recording").await.unwrap();
        let b = store.create("transcript for the second recording").await.unwrap();

        let _stream_a = engine.ask(a, "question").await.unwrap();
        // Session B answers while A is still streaming.
        let stream_b = engine.ask(b, "question").await.unwrap();
        let (_, answer) = collect_answer(stream_b).await;
        assert!(!answer.is_empty());
    }

    // ---- Cancellation ----

    #[tokio::test]
    async fn test_dropping_stream_cancels_and_records_no_turn() {
        let (engine, store) = make_engine(Arc::new(SlowGeneration));
        let id = store.create(TRANSCRIPT).await.unwrap();

        let mut stream = engine.ask(id, "question").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, AnswerEvent::Fragment(_)));
        drop(stream);

        // Let the forwarding task observe the dropped receiver.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let session = store.get(id).unwrap();
        assert!(session.recent_turns().is_empty());
        assert!(session.try_claim().is_ok());
    }
}
