//! Main run loop
//!
//! Loads configuration, starts the scheduler and waits for Ctrl-C.

use super::background_tasks::start_scheduler;
use super::loader::load_config;
use anyhow::{Context, Result};
use botflow_core::JobRegistry;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run configured jobs until interrupted
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = JobRegistry::with_builtins();
    let shutdown = CancellationToken::new();

    let Some(handle) = start_scheduler(&config, &registry, shutdown.clone())
        .await
        .context("Failed to start scheduler")?
    else {
        return Ok(());
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, draining running jobs");

    shutdown.cancel();
    handle.task.await.context("Scheduler loop panicked")?;

    info!(
        "Botflow stopped ({} jobs left pending)",
        handle.scheduler.pending_count().await
    );
    Ok(())
}
