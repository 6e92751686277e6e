//! Recap core crate - shared configuration and error types.
//!
//! Every other Recap crate depends on this one. It defines the
//! top-level `RecapError`, the `Result` alias, and the TOML-backed
//! application configuration.

pub mod config;
pub mod error;

pub use config::RecapConfig;
pub use error::{RecapError, Result};
