//! OpenAI-compatible transcription client.
//!
//! Uploads audio as multipart form data to `/audio/transcriptions`
//! with `response_format=text`, the same call shape as the Whisper
//! API. No retries; failures propagate as typed errors.

use reqwest::multipart;
use tracing::{debug, info};

use recap_core::error::RecapError;

use crate::TranscriptionService;

/// Transcription service backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiTranscription {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiTranscription {
    /// Create a client for the given API base, key, and model.
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl TranscriptionService for OpenAiTranscription {
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, RecapError> {
        if audio.is_empty() {
            return Err(RecapError::Transcription(
                "cannot transcribe empty audio data".to_string(),
            ));
        }

        let url = format!("{}/audio/transcriptions", self.api_base);

        let part = multipart::Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text");

        debug!(bytes = audio.len(), filename, model = %self.model, "Transcribing upload");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecapError::Transcription(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecapError::Transcription(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RecapError::Transcription(format!("invalid response: {}", e)))?;

        info!(chars = text.len(), "Transcription complete");
        Ok(text.trim().to_string())
    }
}
