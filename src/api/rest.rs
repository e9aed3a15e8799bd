// =============================================================================
// REST API Endpoints - Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`; `/analyze` is kept as an alias for the
// path the dashboard already calls.  Responses are JSON; failures use the `AppError`
// body `{"error", "kind", "symbol"?}`.
//
// CORS is permissive: the dashboard is served from a different origin during
// development.  Every request is traced through `TraceLayer`.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Query, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analysis::service::{self, AnalyzeRequest, PortfolioRequest};
use crate::app_state::AppState;
use crate::error::AppError;
use crate::runtime_config::{RuntimeConfig, ScoringConfig};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS, tracing and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        // ── Analysis ────────────────────────────────────────────────
        .route("/api/v1/analyze", get(analyze_query).post(analyze_body))
        .route("/analyze", get(analyze_query).post(analyze_body))
        .route("/api/v1/quotes", get(quotes))
        .route("/api/v1/portfolio/analysis", post(portfolio))
        // ── Runtime config ──────────────────────────────────────────
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config/scoring", post(set_scoring))
        // ── Diagnostics ─────────────────────────────────────────────
        .route("/api/v1/errors", get(errors))
        // ── Middleware & State ───────────────────────────────────────
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Record a request that was rejected before reaching the service layer.
fn rejected(state: &AppState, message: String) -> AppError {
    let err = AppError::InvalidRequest(message);
    state.push_error(&err);
    err
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Analysis
// =============================================================================

async fn analyze_query(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AnalyzeRequest>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(req) = params.map_err(|e| rejected(&state, e.body_text()))?;
    let report = service::analyze(&state, &req).await?;
    Ok(Json(report))
}

async fn analyze_body(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| rejected(&state, e.body_text()))?;
    let report = service::analyze(&state, &req).await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct QuotesParams {
    #[serde(default)]
    symbols: String,
}

async fn quotes(
    State(state): State<Arc<AppState>>,
    params: Result<Query<QuotesParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| rejected(&state, e.body_text()))?;
    let symbols = service::parse_symbols(&params.symbols).map_err(|e| {
        state.push_error(&e);
        e
    })?;
    Ok(Json(service::quotes(&state, &symbols).await))
}

async fn portfolio(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PortfolioRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| rejected(&state, e.body_text()))?;
    let response = service::portfolio(&state, &req).await?;
    Ok(Json(response))
}

// =============================================================================
// Runtime config
// =============================================================================

#[derive(Serialize)]
struct ConfigResponse {
    version: u64,
    config: RuntimeConfig,
}

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ConfigResponse {
        version: state.current_config_version(),
        config: state.config_snapshot(),
    })
}

async fn set_scoring(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScoringConfig>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(scoring) = body.map_err(|e| rejected(&state, e.body_text()))?;
    let config = state.update_scoring(scoring).map_err(|e| {
        state.push_error(&e);
        e
    })?;
    Ok(Json(ConfigResponse {
        version: state.current_config_version(),
        config,
    }))
}

// =============================================================================
// Diagnostics
// =============================================================================

async fn errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_errors())
}
