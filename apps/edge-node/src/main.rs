//! # HealthGuard Edge Node
//!
//! Collects vitals, serves the local dashboard API and forwards readings
//! to the central server.
//!
//! ```text
//! Sensor ──► Collector ──► SQLite ◄──► SyncEngine ──► Central server (HTTPS)
//!                             ▲
//!                   axum (REST + SSE, :8000)
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use healthguard_edge_node::{serve, EdgeConfig, EdgeNode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,healthguard=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting HealthGuard edge node...");

    // Load configuration
    let config = EdgeConfig::load(None).context("Failed to load configuration")?;
    let bind_address = config.server.bind_address();
    info!(
        device_id = %config.device.id,
        database = %config.database.path,
        mock_mode = config.sensor.mock_mode,
        "Configuration loaded"
    );

    // Store, collector, sync engine and scheduler
    let node = Arc::new(
        EdgeNode::start(config)
            .await
            .context("Failed to start edge node")?,
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!(address = %bind_address, "HTTP API listening");

    let served = serve(listener, node.clone(), shutdown_signal()).await;

    node.shutdown().await;
    served.context("HTTP server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
