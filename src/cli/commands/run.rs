//! Monitoring scheduler command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use tracing::info;

use tradekit_config::load_settings;
use tradekit_monitor::Scheduler;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let mut settings = load_settings(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if !args.symbols.is_empty() {
        settings.watchlist = args.symbols;
    }
    ensure!(!settings.watchlist.is_empty(), "watchlist is empty");
    ensure!(!settings.accounts.is_empty(), "no accounts configured");

    let engine = super::build_engine(&settings)?;

    // Pick up any orders left in flight by a previous run
    let reconciled = engine.pipeline.reconcile_active_orders().await?;
    if reconciled > 0 {
        info!(orders = reconciled, "reconciled in-flight orders");
    }

    info!(
        provider = %settings.broker.provider,
        instruments = engine.watchlist.len(),
        accounts = engine.accounts.len(),
        "monitor starting"
    );

    let scheduler = Arc::new(Scheduler::new(
        engine.pipeline,
        engine.accounts,
        engine.watchlist,
        settings.scheduler.clone(),
    ));
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    handle.stop().await;
    info!("monitor stopped");

    Ok(())
}
