//! Recap transcription crate - speech-to-text provider boundary.
//!
//! Provides a trait-based abstraction over an external transcription
//! provider, upload format validation helpers, a mock implementation
//! for testing, and an OpenAI-compatible HTTP client.

use std::future::Future;

use recap_core::error::RecapError;

pub mod openai;

pub use openai::OpenAiTranscription;

/// Audio file extensions accepted for upload, matching what the
/// transcription provider supports.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "webm"];

/// Check whether a filename carries a supported audio extension.
pub fn is_supported_format(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing uploaded audio to text.
///
/// Invoked once per upload, upstream of session creation. The core
/// only ever sees the resulting transcript text.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe the given audio bytes into text.
    ///
    /// The filename is forwarded so the provider can infer the
    /// container format from its extension.
    fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
    ) -> impl Future<Output = Result<String, RecapError>> + Send;
}

/// Object-safe version of [`TranscriptionService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every
/// `TranscriptionService` automatically implements it.
pub trait DynTranscriptionService: Send + Sync {
    /// Transcribe the given audio bytes into text (boxed future).
    fn transcribe_boxed<'a>(
        &'a self,
        audio: &'a [u8],
        filename: &'a str,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<String, RecapError>> + Send + 'a>>;
}

impl<T: TranscriptionService> DynTranscriptionService for T {
    fn transcribe_boxed<'a>(
        &'a self,
        audio: &'a [u8],
        filename: &'a str,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<String, RecapError>> + Send + 'a>> {
        Box::pin(self.transcribe(audio, filename))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcription service for testing without a provider.
///
/// Returns a fixed transcript regardless of audio content; errors on
/// empty input the way a real provider would reject an empty file.
#[derive(Debug, Clone)]
pub struct MockTranscription {
    transcript: String,
}

impl Default for MockTranscription {
    fn default() -> Self {
        Self::new("This is a mock transcription of the uploaded recording.")
    }
}

impl MockTranscription {
    /// Create a mock that returns the given transcript.
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
        }
    }
}

impl TranscriptionService for MockTranscription {
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, RecapError> {
        if audio.is_empty() {
            return Err(RecapError::Transcription(
                "cannot transcribe empty audio data".to_string(),
            ));
        }

        tracing::debug!(
            bytes = audio.len(),
            filename = filename,
            "Mock transcription generated"
        );

        Ok(self.transcript.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Format validation ----

    #[test]
    fn test_supported_formats_accepted() {
        for name in [
            "meeting.mp3",
            "call.wav",
            "memo.m4a",
            "interview.flac",
            "note.ogg",
            "clip.webm",
        ] {
            assert!(is_supported_format(name), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert!(is_supported_format("MEETING.MP3"));
        assert!(is_supported_format("call.Wav"));
    }

    #[test]
    fn test_unsupported_formats_rejected() {
        assert!(!is_supported_format("notes.txt"));
        assert!(!is_supported_format("video.mp4"));
        assert!(!is_supported_format("archive.zip"));
    }

    #[test]
    fn test_missing_extension_rejected() {
        assert!(!is_supported_format("audiofile"));
        assert!(!is_supported_format(""));
    }

    // ---- Mock transcription ----

    #[tokio::test]
    async fn test_mock_transcription_basic() {
        let service = MockTranscription::default();
        let text = service.transcribe(&[0u8; 64], "a.mp3").await.unwrap();
        assert!(text.contains("mock transcription"));
    }

    #[tokio::test]
    async fn test_mock_transcription_custom_text() {
        let service = MockTranscription::new("The cat sat on the mat.");
        let text = service.transcribe(&[1u8; 8], "b.wav").await.unwrap();
        assert_eq!(text, "The cat sat on the mat.");
    }

    #[tokio::test]
    async fn test_mock_transcription_empty_audio() {
        let service = MockTranscription::default();
        let result = service.transcribe(&[], "a.mp3").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dyn_blanket_impl() {
        let service: std::sync::Arc<dyn DynTranscriptionService> =
            std::sync::Arc::new(MockTranscription::default());
        let text = service.transcribe_boxed(&[0u8; 4], "a.ogg").await.unwrap();
        assert!(!text.is_empty());
    }
}
