//! Streaming chat-completion client for OpenAI-compatible APIs.
//!
//! Sends the assembled messages with `stream: true` and decodes the
//! provider's server-sent events into a [`FragmentStream`]. Dropping
//! the stream aborts the HTTP response body and cancels the call.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use recap_core::error::RecapError;

use crate::generation::{FragmentStream, GenerationRequest, GenerationService};

/// Chat-completion provider speaking the OpenAI streaming protocol.
#[derive(Debug, Clone)]
pub struct OpenAiGeneration {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAiGeneration {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl GenerationService for OpenAiGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<FragmentStream, RecapError> {
        let body = json!({
            "model": self.model,
            "messages": request.to_messages(),
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecapError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RecapError::Generation(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        let (tx, rx) = mpsc::channel::<Result<String, RecapError>>(32);
        tokio::spawn(decode_sse_body(response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Decode the provider's SSE body, forwarding content deltas.
///
/// The body arrives as arbitrary byte chunks; events are separated by
/// blank lines, so a carry buffer reassembles split lines. Stops at
/// the `[DONE]` sentinel or when the receiver is dropped.
async fn decode_sse_body(response: reqwest::Response, tx: mpsc::Sender<Result<String, RecapError>>) {
    let mut body = response.bytes_stream();
    let mut carry = String::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send(Err(RecapError::Generation(format!(
                        "stream interrupted: {}",
                        e
                    ))))
                    .await;
                return;
            }
        };
        carry.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(newline) = carry.find('\n') {
            let line = carry[..newline].trim_end_matches('\r').to_string();
            carry.drain(..=newline);

            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            if payload == "[DONE]" {
                return;
            }

            match serde_json::from_str::<StreamChunk>(payload) {
                Ok(chunk) => {
                    let content = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content);
                    if let Some(text) = content {
                        if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                            // Receiver dropped: the caller cancelled.
                            return;
                        }
                    }
                }
                Err(e) => {
                    debug!("Skipping undecodable stream event: {}", e);
                }
            }
        }
    }
}
