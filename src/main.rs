// =============================================================================
// stockscope - Main Entry Point
// =============================================================================
//
// Analysis backend for the stock dashboard.  Serves the REST API; every
// request fetches its own series, so startup only wires config, providers
// and the router.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod error;
mod indicators;
mod market_data;
mod portfolio;
mod regime;
mod runtime_config;
mod signals;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::eastmoney::EastmoneySource;
use crate::market_data::yahoo::YahooSource;
use crate::market_data::MarketRouter;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "stockscope_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("stockscope starting up");

    let config_path =
        std::env::var("STOCKSCOPE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(addr) = std::env::var("STOCKSCOPE_BIND_ADDR") {
        config.server.bind_addr = addr;
    }

    info!(
        bind_addr = %config.server.bind_addr,
        timeout_secs = config.fetch.timeout_secs,
        max_retries = config.fetch.max_retries,
        adjust = ?config.fetch.adjust,
        "Configuration ready"
    );

    // ── 2. Market-data providers ─────────────────────────────────────────
    let eastmoney = EastmoneySource::new(&config.fetch).context("failed to build Eastmoney client")?;
    let yahoo = YahooSource::new(&config.fetch).context("failed to build Yahoo client")?;
    let source = Arc::new(MarketRouter::new(Arc::new(eastmoney), Arc::new(yahoo)));

    // ── 3. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config, config_path, source));

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!(
        uptime_secs = state.uptime_secs(),
        errors_recorded = state.recent_errors().len(),
        "stockscope shut down complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received, stopping gracefully");
}
