//! `autorsync`: keep directories mirrored with rsync while they change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use autorsync_engine::{DEFAULT_CONFIG_FILE, DEFAULT_RSYNC_PATH, RsyncExecutor, SyncEngine, config};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Watch source directories and rsync them to their targets on change.
#[derive(Debug, Parser)]
#[command(name = "autorsync", version)]
struct Cli {
    /// Config file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// rsync executable to use.
    #[arg(long, default_value = DEFAULT_RSYNC_PATH)]
    rsync: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(&cli.config)
        .with_context(|| format!("failed to load config file {}", cli.config.display()))?;

    let executor = Arc::new(RsyncExecutor::new().with_program(&cli.rsync));
    let engine = SyncEngine::start(config, executor).context("failed to start watching")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("Interrupted, shutting down");
        }
        _ = engine.stopped() => {
            warn!("Sync loop stopped unexpectedly");
        }
    }

    engine.shutdown().await?;
    Ok(())
}
