//! Module engine daemon
//!
//! Hosts a `ModuleEngine`, runs the health monitoring loop and serves
//! liveness, readiness, module health and Prometheus metrics over HTTP.

use anyhow::Result;
use engine_lib::{monitor::LoggingRecoveryExecutor, EngineBuilder};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting module-engine");

    let config = config::DaemonConfig::load()?;
    info!(
        addr = %config.listen_addr(),
        interval_ms = config.engine.monitor_interval_ms,
        instances = config.instances.len(),
        "Engine configured"
    );

    let engine = Arc::new(
        EngineBuilder::new()
            .config(config.engine.clone())
            .recovery_executor(Arc::new(LoggingRecoveryExecutor))
            .ledger_uptime(config.uptime_percent)
            .build(),
    );
    engine.logger().log_startup(ENGINE_VERSION);

    for (module, tenant) in config.parsed_instances() {
        if let Err(e) = engine.register_instance(&module, tenant.as_deref()) {
            warn!(module_id = %module, error = %e, "Skipping configured instance");
        }
    }

    engine.start_default_monitoring().await;

    // Start health and metrics server
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app_state = Arc::new(api::AppState::new(engine.clone()));
    let api_handle = tokio::spawn(api::serve(config.listen_addr(), app_state, async move {
        let _ = shutdown_rx.await;
    }));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    engine.logger().log_shutdown("SIGINT received");

    engine.stop_monitoring().await;
    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server exited with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
