//! Daemon entry point: parse flags, load config, connect, run.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shellvisor::{Config, Daemon};

/// Serve shell scripts as NATS microservices.
#[derive(Parser, Debug)]
#[command(name = "shellvisor", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
        config.validate().context("invalid log level override")?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        bus_url = %config.bus_url,
        scripts_dir = %config.scripts_dir.display(),
        log_level = %config.log_level,
        "starting shellvisor"
    );

    let client = async_nats::connect(&config.bus_url)
        .await
        .with_context(|| format!("failed to connect to bus at {}", config.bus_url))?;
    info!(bus_url = %config.bus_url, "connected to bus");

    Daemon::new(config, client).run().await?;

    info!("shellvisor stopped gracefully");
    Ok(())
}
