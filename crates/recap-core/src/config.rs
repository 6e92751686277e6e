use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RecapError, Result};

/// Top-level configuration for the Recap service.
///
/// Loaded from `~/.recap/config.toml` by default. Each section covers
/// one stage of the upload-transcribe-converse flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecapConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            provider: ProviderConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl RecapConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecapConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if
    /// the file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RecapError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RecapError::Config("chunk_size must be > 0".to_string()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(RecapError::Config(
                "overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RecapError::Config("top_k must be > 0".to_string()));
        }
        if self.session.ttl_secs == 0 {
            return Err(RecapError::Config("ttl_secs must be > 0".to_string()));
        }
        Ok(())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Address to bind the HTTP server to.
    pub host: String,
    /// HTTP server port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

/// Transcript chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Retrieval parameters for answering questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages retrieved per question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Session lifecycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle seconds before a session is evicted.
    pub ttl_secs: i64,
    /// Number of recent turns kept as conversation memory.
    pub memory_turns: usize,
    /// Seconds between background expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            memory_turns: 3,
            sweep_interval_secs: 60,
        }
    }
}

/// External provider settings (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// API key. Empty means "use mock providers".
    /// Usually supplied via the RECAP_OPENAI_API_KEY env var instead.
    pub api_key: String,
    /// Speech-to-text model name.
    pub transcription_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Chat completion model name.
    pub generation_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            transcription_model: "whisper-1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Upload validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted audio file size in bytes.
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            // Matches the transcription provider's 25MB file limit.
            max_bytes: 25 * 1024 * 1024,
        }
    }
}
