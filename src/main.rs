//! resview-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use resview_gateway::config::{GatewayConfig, LogFormat};
use resview_gateway::domain::{EventBus, ResourceStore};
use resview_gateway::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting resview-gateway");

    // Build domain layer
    let bus = EventBus::new(config.event_bus_capacity);
    tracing::debug!(capacity = bus.capacity(), "event bus ready");
    let store = Arc::new(ResourceStore::new(bus));

    // Shutdown on Ctrl-C cancels every session
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "couldn't listen for shutdown signal");
                return;
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    // Build router
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("couldn't bind {}", config.listen_addr))?;
    let app = server::build_app(server::build_state(config, store, shutdown.clone()));

    // Start server
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    server::serve(listener, app, shutdown).await?;

    tracing::info!("server stopped");
    Ok(())
}
