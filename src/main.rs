//! Main entry point for the asana-extractor CLI

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use asana_extractor::cancel::{cancel_on_shutdown_signal, Cancellation};
use asana_extractor::cli::Cli;
use asana_extractor::metrics;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("asana_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be populated
    let dotenv = dotenvy::dotenv();

    init_tracing();
    if let Err(e) = &dotenv {
        if !e.not_found() {
            warn!(error = %e, "Ignoring unreadable .env file");
        }
    }

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr).await?;
    }

    let cancel = Cancellation::shared();
    let _signal_listener = cancel_on_shutdown_signal(cancel.clone())?;

    if let Err(e) = cli.execute(cancel).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
