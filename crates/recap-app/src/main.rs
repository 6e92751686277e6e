//! Recap application binary - composition root.
//!
//! Ties together all Recap crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Pick providers (OpenAI-compatible API, or mocks without a key)
//! 3. Build the session store and conversation engine
//! 4. Start the background session expiry sweep
//! 5. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use recap_api::{routes, AppState};
use recap_chat::{
    ConversationEngine, DynGenerationService, MockGeneration, OpenAiGeneration, SessionStore,
};
use recap_core::config::RecapConfig;
use recap_transcribe::{DynTranscriptionService, MockTranscription, OpenAiTranscription};
use recap_vector::embedding::{DynEmbeddingService, MockEmbedding, OpenAiEmbedding};

use cli::CliArgs;

/// The external provider services, selected once at startup.
struct Providers {
    embedder: Arc<dyn DynEmbeddingService>,
    transcriber: Arc<dyn DynTranscriptionService>,
    generator: Arc<dyn DynGenerationService>,
}

/// Select real or mock providers based on API key availability.
///
/// The key comes from RECAP_OPENAI_API_KEY, falling back to the
/// config file. Without one, every provider is a mock and the server
/// only makes sense for local development.
fn select_providers(config: &RecapConfig) -> Providers {
    let api_key = std::env::var("RECAP_OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| config.provider.api_key.clone());

    if api_key.trim().is_empty() {
        tracing::warn!("No API key configured; running with mock providers");
        return Providers {
            embedder: Arc::new(MockEmbedding::new()),
            transcriber: Arc::new(MockTranscription::default()),
            generator: Arc::new(MockGeneration::new()),
        };
    }

    let p = &config.provider;
    tracing::info!(api_base = %p.api_base, "Using OpenAI-compatible providers");
    Providers {
        embedder: Arc::new(OpenAiEmbedding::new(
            &p.api_base,
            &api_key,
            &p.embedding_model,
        )),
        transcriber: Arc::new(OpenAiTranscription::new(
            &p.api_base,
            &api_key,
            &p.transcription_model,
        )),
        generator: Arc::new(OpenAiGeneration::new(
            &p.api_base,
            &api_key,
            &p.generation_model,
        )),
    }
}

/// Periodically evict sessions idle past their TTL.
async fn sweep_loop(store: Arc<SessionStore>, interval_secs: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
    // The first tick fires immediately; skip it.
    interval.tick().await;
    loop {
        interval.tick().await;
        store.sweep();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level default comes from it.
    let config_file = args.resolve_config_path();
    let mut config = RecapConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.validate()?;

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Recap v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let providers = select_providers(&config);

    let store = Arc::new(SessionStore::new(providers.embedder, &config));
    let engine = Arc::new(ConversationEngine::new(
        Arc::clone(&store),
        Arc::clone(&providers.generator),
        &config,
    ));

    tokio::spawn(sweep_loop(
        Arc::clone(&store),
        config.session.sweep_interval_secs,
    ));

    let state = AppState::new(
        config,
        store,
        engine,
        providers.transcriber,
        providers.generator,
    );

    routes::start_server(state).await?;
    Ok(())
}
