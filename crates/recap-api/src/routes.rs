//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, request tracing, the global
//! body limit, and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Multipart framing adds overhead beyond the audio payload itself.
    let body_limit = state.config.upload.max_bytes + 1024 * 1024;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/process", post(handlers::process))
        .route(
            "/process-with-summary",
            post(handlers::process_with_summary),
        )
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{id}", get(handlers::session_info))
        .route("/sessions/{id}/ask", post(handlers::ask))
        .route("/debug/sessions", get(handlers::debug_sessions))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(state: AppState) -> Result<(), recap_core::error::RecapError> {
    let addr = format!("{}:{}", state.config.general.host, state.config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| recap_core::error::RecapError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| recap_core::error::RecapError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
