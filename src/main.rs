//! arena-relay server entry point.
//!
//! Starts the orchestrator, the bracket worker, the plugin link, and the
//! Axum HTTP server with the WebSocket endpoint.

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use arena_relay::api;
use arena_relay::app_state::AppState;
use arena_relay::bracket::{self, BracketClient, BracketQueue};
use arena_relay::config::{LogFormat, ManagerConfig};
use arena_relay::domain::ArenaAllocator;
use arena_relay::plugin;
use arena_relay::service::{Orchestrator, OrchestratorHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    // Load configuration
    let config = ManagerConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, plugin = %config.plugin_url, "starting arena-relay");

    // Build core state
    let arenas = ArenaAllocator::new(&config.arena_priority).context("invalid ARENA_PRIORITY")?;
    let client = BracketClient::new(&config.bracket).context("bracket client")?;
    let (queue, jobs) = BracketQueue::channel();
    let (handle, events) = OrchestratorHandle::channel();

    // Spawn tasks
    let orchestrator = Orchestrator::new(config.admin_key.clone(), arenas, queue).spawn(events);
    let _bracket = bracket::worker::spawn(client, jobs, handle.clone());
    let _plugin = plugin::link::spawn(config.plugin_url.clone(), config.plugin_reconnect, handle.clone());

    // Build router
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(handle));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.abort();
    tracing::info!("arena-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "ctrl-c handler failed");
    }
    tracing::info!("shutdown requested");
}
