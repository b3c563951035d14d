//! harbor proxy entry point.
//!
//! Boots the interception proxy in front of the configured origin. Logging
//! goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use harbor_client::fetch::resolve;
use harbor_client::{ClientNotifier, FetchClient, FetchConfig, Origin};
use harbor_core::{AppConfig, CacheDb, UploadQueue};

mod connectivity;
mod dispatch;
mod error;
mod handler;
mod routes;

#[cfg(test)]
mod testing;

use connectivity::ConnectivityMonitor;
use dispatch::{Dispatcher, Worker};
use handler::AppState;

/// Signals in flight before submitters wait.
const DISPATCH_CAPACITY: usize = 256;

/// Messages buffered per connected client.
const CLIENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let base = config.origin()?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let queue = UploadQueue::new(db.clone(), config.max_queue_len);
    let notifier = ClientNotifier::new(CLIENT_BUFFER);
    let origin: Arc<dyn Origin> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let worker = Arc::new(Worker::new(&config, base.clone(), origin, db, queue, notifier.clone()));
    let (dispatcher, dispatch_task) = Dispatcher::spawn(worker.clone(), DISPATCH_CAPACITY);

    tracing::info!(origin = %base, db = %config.db_path.display(), "starting harbor");
    if !dispatch::bootstrap(&dispatcher).await {
        tracing::warn!("serving in pass-through mode until the origin is reachable");
    }

    let health = resolve(&base, &config.health_path)?;
    let monitor = ConnectivityMonitor::new(worker.clone(), dispatcher.clone(), health, config.probe_interval());
    let monitor_task = tokio::spawn(monitor.run());

    let app = handler::router(AppState {
        dispatcher,
        worker,
        notifier,
        base,
        max_body_bytes: config.max_body_bytes,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "proxy listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    monitor_task.abort();
    dispatch_task.abort();
    tracing::info!("harbor stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
