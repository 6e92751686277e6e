//! Generation provider boundary: prompt assembly, the streaming
//! service trait, and a mock implementation for testing.
//!
//! The provider returns answer fragments as a lazy stream; dropping
//! the stream cancels the underlying call. No retries happen here.

use std::pin::Pin;

use futures::Stream;
use serde::Serialize;

use recap_core::error::RecapError;

use crate::types::Turn;

/// Lazy sequence of answer fragments from the generation provider.
///
/// Ends naturally on successful completion; an `Err` item means the
/// call failed mid-stream and no further fragments will arrive.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RecapError>> + Send>>;

/// One message in a chat-completion request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

/// Everything the generation provider needs for one call.
///
/// For question answering this is the retrieved passages (in the
/// order retrieval returned them), the recent turns (oldest first, so
/// chronology is preserved), and the new question. Summaries reuse
/// the same shape with no passages or history.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System prompt for the provider.
    pub system: String,
    /// Retrieved transcript passages, best match first.
    pub passages: Vec<String>,
    /// Recent conversation turns, oldest first.
    pub history: Vec<Turn>,
    /// The user's new question (or the text to summarize).
    pub question: String,
}

const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant answering questions about one \
audio recording. Answer only from the transcript excerpts provided. If the excerpts do \
not contain the answer, say so instead of guessing.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a text summarization assistant. Summarize \
the provided transcript concisely and accurately, highlighting the key points.";

impl GenerationRequest {
    /// Build a question-answering request.
    pub fn answer(passages: Vec<String>, history: Vec<Turn>, question: &str) -> Self {
        Self {
            system: ANSWER_SYSTEM_PROMPT.to_string(),
            passages,
            history,
            question: question.to_string(),
        }
    }

    /// Build a transcript summarization request.
    pub fn summarize(transcript: &str) -> Self {
        Self {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            passages: Vec::new(),
            history: Vec::new(),
            question: format!("Summarize the following transcript:\n\n{}", transcript),
        }
    }

    /// Flatten the request into provider chat messages.
    ///
    /// Order: system prompt, then each history turn as a user/assistant
    /// pair (oldest first), then one user message holding the excerpts
    /// and the new question.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + self.history.len() * 2);
        messages.push(ChatMessage::new("system", self.system.clone()));

        for turn in &self.history {
            messages.push(ChatMessage::new("user", turn.question.clone()));
            messages.push(ChatMessage::new("assistant", turn.answer.clone()));
        }

        let mut content = String::new();
        if !self.passages.is_empty() {
            content.push_str("Transcript excerpts:\n");
            for passage in &self.passages {
                content.push_str("---\n");
                content.push_str(passage);
                content.push('\n');
            }
            content.push('\n');
        }
        content.push_str(&self.question);
        messages.push(ChatMessage::new("user", content));

        messages
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Service producing a streamed answer for a generation request.
pub trait GenerationService: Send + Sync {
    /// Start a generation call and return its fragment stream.
    ///
    /// The returned future resolves once the provider has accepted
    /// the request; fragments then arrive lazily on the stream.
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl std::future::Future<Output = Result<FragmentStream, RecapError>> + Send;
}

/// Object-safe version of [`GenerationService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every
/// `GenerationService` automatically implements it.
pub trait DynGenerationService: Send + Sync {
    /// Start a generation call (boxed future).
    fn generate_boxed<'a>(
        &'a self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<FragmentStream, RecapError>> + Send + 'a>>;
}

impl<T: GenerationService> DynGenerationService for T {
    fn generate_boxed<'a>(
        &'a self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<FragmentStream, RecapError>> + Send + 'a>>
    {
        Box::pin(self.generate(request))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock generation service returning deterministic fragments.
///
/// Produces a short answer built from the best retrieved passage so
/// engine tests can assert on content without a provider.
#[derive(Debug, Clone, Default)]
pub struct MockGeneration;

impl MockGeneration {
    pub fn new() -> Self {
        Self
    }
}

impl GenerationService for MockGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, RecapError> {
        let body = match request.passages.first() {
            Some(passage) => format!("Based on the recording: {}", passage),
            None => "The recording does not cover that.".to_string(),
        };

        let fragments: Vec<Result<String, RecapError>> = body
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();

        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn turn(q: &str, a: &str) -> Turn {
        Turn {
            question: q.to_string(),
            answer: a.to_string(),
            created_at: 0,
        }
    }

    // ---- Prompt assembly ----

    #[test]
    fn test_answer_messages_order() {
        let request = GenerationRequest::answer(
            vec!["passage one".to_string(), "passage two".to_string()],
            vec![turn("q1", "a1"), turn("q2", "a2")],
            "q3",
        );
        let messages = request.to_messages();

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "q1");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "a1");
        assert_eq!(messages[3].content, "q2");
        assert_eq!(messages[4].content, "a2");
        assert_eq!(messages[5].role, "user");
        assert!(messages[5].content.contains("passage one"));
        assert!(messages[5].content.contains("passage two"));
        assert!(messages[5].content.ends_with("q3"));
    }

    #[test]
    fn test_passages_keep_retrieval_order() {
        let request = GenerationRequest::answer(
            vec!["alpha passage".to_string(), "beta passage".to_string()],
            vec![],
            "q",
        );
        let content = &request.to_messages()[1].content;
        assert!(content.find("alpha passage").unwrap() < content.find("beta passage").unwrap());
    }

    #[test]
    fn test_no_passages_no_excerpt_header() {
        let request = GenerationRequest::answer(vec![], vec![], "just the question");
        let messages = request.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "just the question");
    }

    #[test]
    fn test_summarize_request_shape() {
        let request = GenerationRequest::summarize("full transcript here");
        assert!(request.passages.is_empty());
        assert!(request.history.is_empty());
        assert!(request.question.contains("full transcript here"));
        let messages = request.to_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("summarization"));
    }

    // ---- Mock generation ----

    #[tokio::test]
    async fn test_mock_streams_fragments() {
        let service = MockGeneration::new();
        let request =
            GenerationRequest::answer(vec!["the cat sat on the mat".to_string()], vec![], "q");
        let stream = service.generate(request).await.unwrap();

        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert!(fragments.len() > 1);
        let answer: String = fragments.concat();
        assert_eq!(answer, "Based on the recording: the cat sat on the mat");
    }

    #[tokio::test]
    async fn test_mock_without_passages() {
        let service = MockGeneration::new();
        let request = GenerationRequest::answer(vec![], vec![], "q");
        let stream = service.generate(request).await.unwrap();
        let answer: String = stream.map(|r| r.unwrap()).collect::<Vec<_>>().await.concat();
        assert_eq!(answer, "The recording does not cover that.");
    }

    #[tokio::test]
    async fn test_dyn_blanket_impl() {
        let service: std::sync::Arc<dyn DynGenerationService> =
            std::sync::Arc::new(MockGeneration::new());
        let stream = service
            .generate_boxed(GenerationRequest::answer(vec![], vec![], "q"))
            .await
            .unwrap();
        let fragments: Vec<_> = stream.collect().await;
        assert!(!fragments.is_empty());
    }
}
