// =============================================================================
// chartfeed — Main Entry Point
// =============================================================================
//
// Live market-data core for the trading dashboard: one WebSocket feed
// subscription folded into a rolling candle window, indicators recomputed on
// every effective update, snapshots served over REST and a push WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod chart;
mod error;
mod indicators;
mod market_data;
mod runtime_config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{backfill, feed};
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "chartfeed.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Env overrides for the most commonly tweaked knobs.
    if let Ok(symbol) = std::env::var("CHARTFEED_SYMBOL") {
        config.symbol = symbol.trim().to_uppercase();
    }
    if let Ok(interval) = std::env::var("CHARTFEED_INTERVAL") {
        config.interval = interval.trim().to_string();
    }
    if let Ok(url) = std::env::var("CHARTFEED_FEED_URL") {
        config.feed_url = url;
    }

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        capacity = config.capacity,
        "chartfeed starting"
    );

    // ── 2. Build shared state + supervisor command channel ───────────────
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(config, command_tx));

    // ── 3. Backfill the window from the exchange REST API ────────────────
    {
        let cfg = state.runtime_config.read().clone();
        match backfill::backfill_window(&state.subscription, &cfg.rest_url, cfg.capacity).await {
            Ok(merged) => info!(merged, "window backfilled"),
            Err(e) => warn!(error = %e, "backfill failed, starting with an empty window"),
        }
    }

    // ── 4. Spawn the feed supervisor ─────────────────────────────────────
    let feed_state = state.clone();
    let supervisor = tokio::spawn(async move {
        feed::run_feed_supervisor(feed_state, command_rx).await;
    });

    // ── 5. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr =
        std::env::var("CHARTFEED_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let app = api::rest::router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    // The supervisor tears the subscription down on its way out, so no merge
    // or notification can happen once it returns.
    state.request_shutdown();
    if let Err(e) = supervisor.await {
        error!(error = %e, "feed supervisor task panicked");
    }

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("chartfeed shut down complete.");
    Ok(())
}
