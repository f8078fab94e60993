//! expco
//!
//! Experiment coordinator: polls an S³I message and event queue, dispatches
//! what arrives to the registered handlers and keeps the results in Postgres.

mod commands;
mod config;
mod shutdown;
mod state;

use clap::Parser;
use commands::Command;
use config::ConfigLoader;
use state::AppState;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// expco - S³I experiment coordinator
#[derive(Parser, Debug)]
#[command(name = "expco")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "EXPCO_CONFIG", default_value = "./expco.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,

    /// Run database migrations before the command
    #[arg(long, default_value = "false")]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting expco v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::new(&args.config).load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let state = AppState::new(config, args.migrate)?;

    commands::execute(args.command, &state).await
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,reqwest=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
