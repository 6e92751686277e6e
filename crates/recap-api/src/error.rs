//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across
//! all endpoints, mapping conversation errors to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use recap_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - the session is already answering a question.
    Conflict(String),
    /// 413 Payload Too Large - upload exceeds the size limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - the generation provider failed.
    BadGateway(String),
    /// 503 Service Unavailable - the embedding provider is unreachable.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyTranscript | ChatError::InvalidQuestion => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::SessionBusy(_) => ApiError::Conflict(err.to_string()),
            ChatError::GenerationFailed(_) => ApiError::BadGateway(err.to_string()),
            ChatError::EmbeddingUnavailable(_) => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<recap_core::error::RecapError> for ApiError {
    fn from(err: recap_core::error::RecapError) -> Self {
        match &err {
            recap_core::error::RecapError::Transcription(msg) => ApiError::BadGateway(msg.clone()),
            recap_core::error::RecapError::Embedding(msg) => {
                ApiError::ServiceUnavailable(msg.clone())
            }
            recap_core::error::RecapError::Generation(msg) => ApiError::BadGateway(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
