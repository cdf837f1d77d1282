// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only snapshot accessors,
// except the manual reconnect control. CORS is configured permissively: the
// consumer is a browser dashboard served from another origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::chart::build_chart_series;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/candles", get(candles))
        .route("/api/v1/indicators", get(indicators))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/connection", get(connection))
        .route("/api/v1/connection/reconnect", post(reconnect))
        // ── WebSocket (handled in the ws module but mounted here) ───────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Snapshot accessors
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn candles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.subscription.candles())
}

async fn indicators(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.subscription.indicators())
}

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let candles = state.subscription.candles();
    let indicators = state.subscription.indicators();
    Json(build_chart_series(candles, &indicators))
}

async fn connection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let machine = state.connection.read();
    let body = serde_json::json!({
        "state": machine.state(),
        "retry_count": machine.retry_count(),
    });
    Json(body)
}

// =============================================================================
// Manual reconnect control
// =============================================================================

async fn reconnect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("manual reconnect requested via API");

    if state.request_reconnect() {
        let body = serde_json::json!({ "status": "reconnecting" });
        (StatusCode::ACCEPTED, Json(body)).into_response()
    } else {
        let body = serde_json::json!({ "error": "feed supervisor is not running" });
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
