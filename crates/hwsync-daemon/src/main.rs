//! hwsyncd - bare-metal node reconciliation daemon
//!
//! Keeps nodes in the Node Registry in step with the Hardware Manager:
//! - binds server profiles to enrolling nodes
//! - registers each node's boot MAC as a port
//! - walks nodes from enroll through manageable to available
//! - reports hardware that matches a template but has no node

use anyhow::Context;
use clap::Parser;
use hwsync_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// hwsync daemon CLI
#[derive(Parser)]
#[command(name = "hwsyncd")]
#[command(about = "hwsync - bare-metal node reconciliation daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HWSYNC_CONFIG")]
    config: Option<String>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, env = "HWSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HWSYNC_LOG_JSON")]
    json: bool,

    /// Run a single reconciliation pass and exit
    #[arg(long)]
    once: bool,

    /// Keep registry writes in memory
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration first so the log level can come from it
    let config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        hardware_manager = %config.hardware_manager.url,
        registry = %config.registry.url,
        dry_run = cli.dry_run,
        "Starting hwsyncd"
    );

    let server = Server::new(config, cli.dry_run)
        .await
        .context("starting hwsyncd")?;

    if cli.once {
        let reports = server.run_once().await?;
        let failed = reports.iter().filter(|r| r.is_failure()).count();
        anyhow::ensure!(failed == 0, "{} of {} nodes failed", failed, reports.len());
        return Ok(());
    }

    server.run().await?;
    Ok(())
}
