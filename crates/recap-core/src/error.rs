use thiserror::Error;

/// Top-level error type for the Recap system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates
/// define their own error types and implement `From<SubsystemError>
/// for RecapError` so the `?` operator works across crate boundaries.
/// Provider failures are never retried here; they propagate upward as
/// typed errors and the caller decides whether to retry the whole
/// operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for RecapError {
    fn from(err: toml::de::Error) -> Self {
        RecapError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RecapError {
    fn from(err: toml::ser::Error) -> Self {
        RecapError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RecapError {
    fn from(err: serde_json::Error) -> Self {
        RecapError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Recap operations.
pub type Result<T> = std::result::Result<T, RecapError>;
