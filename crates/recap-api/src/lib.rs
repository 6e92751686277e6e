//! Recap API crate - the HTTP surface.
//!
//! Exposes audio upload, session creation, question answering over
//! SSE, and diagnostic endpoints on an axum router.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
