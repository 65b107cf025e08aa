//! hive daemon
//!
//! Coordinator by default; the hidden `worker` subcommand is the
//! re-invocation path the coordinator uses to spawn fleet members.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hive_core::config::{self, HiveConfig};

#[derive(Parser)]
#[command(name = "hived")]
#[command(about = "hive daemon - multi-worker launch and coordination")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker instances (overrides config)
    #[arg(short, long)]
    instances: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a fleet worker, reading the startup spec from stdin.
    /// Invoked by the coordinator, never by hand.
    #[command(hide = true)]
    Worker,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(Command::Worker) = args.command {
        return hived::worker::run().await.context("worker failed");
    }

    tracing::info!("hive daemon starting...");

    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                HiveConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            HiveConfig::default()
        }
    };

    if let Some(instances) = args.instances {
        config.coordinator.instances = instances;
    }

    hived::coordinator::run(config).await?;

    tracing::info!("hive daemon shutdown complete");
    Ok(())
}
