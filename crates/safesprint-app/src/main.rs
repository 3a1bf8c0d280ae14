//! SafeSprint binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Open the SQLite database
//! 3. Build the completion backend
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use safesprint_api::{start_server, AppState};
use safesprint_core::config::SafeSprintConfig;
use safesprint_llm::{CompletionBackend, GeminiClient, MockCompletionService};
use safesprint_storage::Database;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = SafeSprintConfig::load_or_default(&config_file);
    config.server.port = args.resolve_port(config.server.port);

    // Tracing. RUST_LOG wins over the flag and the config file.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting SafeSprint v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("safesprint.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Completion backend.
    let completion = if args.mock_completion {
        tracing::warn!("Using the mock completion backend; replies are canned");
        CompletionBackend::Mock(Arc::new(MockCompletionService::new()))
    } else {
        let client = GeminiClient::from_config(&config.completion)?;
        tracing::info!(model = %client.model(), "Completion backend ready");
        CompletionBackend::Gemini(client)
    };

    let state = AppState::new(config.clone(), db, completion);
    start_server(&config, state).await?;

    Ok(())
}
