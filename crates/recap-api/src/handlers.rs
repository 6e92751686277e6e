//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, drives the
//! store/engine/provider services from AppState, and returns JSON or
//! an SSE stream. Streamed endpoints emit data-only events whose JSON
//! payload carries a `type` field.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::warn;
use uuid::Uuid;

use recap_chat::{AnswerEvent, GenerationRequest, SessionInfo};
use recap_transcribe::{is_supported_format, SUPPORTED_EXTENSIONS};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    pub transcription: String,
    pub filename: String,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub transcription: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub passage_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DebugSessionsResponse {
    pub active_sessions: usize,
    pub session_ids: Vec<Uuid>,
}

// =============================================================================
// Info endpoints
// =============================================================================

/// GET / - service name, version, and endpoint map.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "recap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "GET /health".to_string(),
            "POST /process".to_string(),
            "POST /process-with-summary".to_string(),
            "POST /sessions".to_string(),
            "POST /sessions/{id}/ask".to_string(),
            "GET /sessions/{id}".to_string(),
            "GET /debug/sessions".to_string(),
        ],
    })
}

/// GET /health - liveness, uptime, and session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.store.len(),
    })
}

// =============================================================================
// Upload endpoints
// =============================================================================

/// POST /process - upload audio, transcribe, start a session.
pub async fn process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let upload = read_audio_upload(multipart, state.config.upload.max_bytes).await?;

    let transcription = state
        .transcriber
        .transcribe_boxed(&upload.data, &upload.filename)
        .await?;

    let session_id = state.store.create(&transcription).await?;

    Ok(Json(ProcessResponse {
        status: "success".to_string(),
        transcription,
        filename: upload.filename,
        session_id,
    }))
}

/// POST /process-with-summary - upload audio, stream transcription,
/// session id, and a summary over SSE.
///
/// Upload validation errors are returned as plain HTTP errors before
/// any event; failures after that point arrive as an `error` event,
/// and fragments already sent are not retracted.
pub async fn process_with_summary(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let upload = read_audio_upload(multipart, state.config.upload.max_bytes).await?;

    let (tx, rx) = mpsc::channel::<Event>(32);
    tokio::spawn(run_summary_pipeline(state, upload, tx));

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Drive transcribe -> create session -> summarize, emitting events.
async fn run_summary_pipeline(state: AppState, upload: AudioUpload, tx: mpsc::Sender<Event>) {
    let send = |value: serde_json::Value| {
        let tx = tx.clone();
        async move { tx.send(Event::default().data(value.to_string())).await.is_ok() }
    };

    if !send(json!({"type": "status", "message": "Transcribing audio"})).await {
        return;
    }

    let transcription = match state
        .transcriber
        .transcribe_boxed(&upload.data, &upload.filename)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("Transcription failed: {}", e);
            send(json!({"type": "error", "message": e.to_string()})).await;
            return;
        }
    };
    if !send(json!({"type": "transcription", "text": transcription})).await {
        return;
    }

    let session_id = match state.store.create(&transcription).await {
        Ok(id) => id,
        Err(e) => {
            send(json!({"type": "error", "message": e.to_string()})).await;
            return;
        }
    };
    if !send(json!({"type": "session", "session_id": session_id})).await {
        return;
    }

    if !send(json!({"type": "status", "message": "Generating summary"})).await {
        return;
    }
    let mut fragments = match state
        .generator
        .generate_boxed(GenerationRequest::summarize(&transcription))
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            send(json!({"type": "error", "message": e.to_string()})).await;
            return;
        }
    };

    let mut summary = String::new();
    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => {
                summary.push_str(&text);
                if !send(json!({"type": "summary_chunk", "text": text})).await {
                    return;
                }
            }
            Err(e) => {
                warn!("Summary generation failed mid-stream: {}", e);
                send(json!({"type": "error", "message": e.to_string()})).await;
                return;
            }
        }
    }

    send(json!({
        "type": "complete",
        "summary": summary,
        "session_id": session_id,
    }))
    .await;
}

// =============================================================================
// Session endpoints
// =============================================================================

/// POST /sessions - create a session from pre-transcribed text.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session_id = state.store.create(&body.transcription).await?;
    let passage_count = state.store.get(session_id)?.info().passage_count;

    Ok(Json(CreateSessionResponse {
        session_id,
        passage_count,
    }))
}

/// POST /sessions/{id}/ask - stream an answer over SSE.
///
/// Typed failures before the first fragment map to HTTP statuses; a
/// provider failure mid-answer arrives as an `error` event.
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AskRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let answer_stream = state.engine.ask(id, &body.question).await?;

    let store = Arc::clone(&state.store);
    let events = answer_stream.map(move |item| {
        let payload = match item {
            Ok(AnswerEvent::Fragment(text)) => json!({"type": "answer_chunk", "text": text}),
            Ok(AnswerEvent::Done { answer }) => {
                let turn_count = store.get(id).map(|s| s.info().turn_count).unwrap_or(0);
                json!({"type": "done", "answer": answer, "turn_count": turn_count})
            }
            Err(e) => json!({"type": "error", "message": e.to_string()}),
        };
        Ok::<_, Infallible>(Event::default().data(payload.to_string()))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// GET /sessions/{id} - session state snapshot.
pub async fn session_info(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.store.get(id)?.info()))
}

/// GET /debug/sessions - live session ids for diagnostics.
pub async fn debug_sessions(State(state): State<AppState>) -> Json<DebugSessionsResponse> {
    let infos = state.store.list_info();
    Json(DebugSessionsResponse {
        active_sessions: infos.len(),
        session_ids: infos.into_iter().map(|info| info.id).collect(),
    })
}

// =============================================================================
// Upload validation
// =============================================================================

struct AudioUpload {
    filename: String,
    data: Vec<u8>,
}

/// Pull the `file` field out of a multipart upload and validate it.
async fn read_audio_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<AudioUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("upload is missing a filename".to_string()))?;

        if !is_supported_format(&filename) {
            return Err(ApiError::BadRequest(format!(
                "unsupported audio format; expected one of: {}",
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
        if data.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "file exceeds the {} byte limit",
                max_bytes
            )));
        }

        return Ok(AudioUpload {
            filename,
            data: data.to_vec(),
        });
    }

    Err(ApiError::BadRequest(
        "multipart field 'file' is required".to_string(),
    ))
}
