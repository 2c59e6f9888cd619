// =============================================================================
// Pulse Feed — Main Entry Point
// =============================================================================
//
// Serves a rolling window of recent chain transactions and per-minute
// throughput over REST and WebSocket. The synthetic event source always runs;
// the live chain feed only gates the `/api/stream/*` endpoints.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod chain;
mod config;
mod feed;
mod source;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::FeedConfig;
use crate::source::MockEventSource;

const CONFIG_PATH: &str = "feed_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Pulse Feed — starting up");

    let mut config = FeedConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        FeedConfig::default()
    });
    config.apply_env();
    info!(config = ?config, "configuration resolved");

    // ── 2. Live chain feed (decided once) ────────────────────────────────
    let (availability, chain) = chain::connect(&config).await;
    info!(availability = %availability, "live chain feed state");

    // ── 3. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(&config, availability, chain));

    // ── 4. Synthetic event source ────────────────────────────────────────
    tokio::spawn(source::run_event_source(
        state.feed.clone(),
        MockEventSource::new(),
        config.tick_interval(),
    ));

    // ── 5. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening (REST + /ws)");

    // ── 6. Serve until Ctrl+C ────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!(
        transactions = state.feed.stats().total_count,
        "Pulse Feed shut down complete"
    );
    Ok(())
}
