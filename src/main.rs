//! Rollcall Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Loaded from `config.toml` (see `rollcall config` for a template), with
//! environment variable overrides:
//! - `ROLLCALL_HOST`: Host to bind to (default: 0.0.0.0)
//! - `ROLLCALL_PORT`: Port to listen on (default: 8090)
//! - `ROLLCALL_HEARTBEAT_INTERVAL_SECS`: Heartbeat sweep period (default: 30)
//! - `ROLLCALL_MAX_CONNECTIONS`: Connection cap (default: 1000)
//! - `ROLLCALL_LOG_LEVEL` / `ROLLCALL_LOG_FORMAT`: Logging settings

use clap::{Parser, Subcommand};
use rollcall::api::{serve, AppState};
use rollcall::config::{generate_default_config, Config};
use rollcall::websocket::spawn_heartbeat;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Real-time legislative event fan-out server")]
struct Cli {
    /// Path to a config file (overrides the default search locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the fan-out server (default)
    Serve,
    /// Print a default config file to stdout
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Command::Config)) {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config);

    tracing::info!("Starting Rollcall v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        heartbeat_secs = config.websocket.heartbeat_interval_secs,
        max_connections = config.websocket.max_connections,
        "WebSocket settings"
    );

    let server_config = config.server.clone();
    let heartbeat_interval = config.websocket.heartbeat_interval();

    let state = AppState::new(config);

    let heartbeat = spawn_heartbeat(Arc::clone(&state.registry), heartbeat_interval);

    serve(state, &server_config).await?;

    heartbeat.abort();
    tracing::info!("Rollcall stopped");

    Ok(())
}

/// Initialize the tracing subscriber from logging config
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rollcall={},tower_http=info", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
