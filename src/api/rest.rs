// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only queries over the feed plus the live-chain stream endpoints, which
// answer 503 unless the chain feed came up `Ready` at startup. The WebSocket
// push channel is mounted on the same router at `/ws`.
//
// CORS is configured permissively; the dashboard is served from elsewhere.
// =============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::chain::ChainClient;
use crate::types::FeedAvailability;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // ── Queries ─────────────────────────────────────────────────
        .route("/api/transactions", get(transactions))
        .route("/api/stats", get(stats))
        // ── Live chain streams ──────────────────────────────────────
        .route("/api/stream/subscribe", post(stream_subscribe))
        .route("/api/stream/publish", post(stream_publish))
        // ── Push channel ────────────────────────────────────────────
        .route("/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    feed_availability: FeedAvailability,
    subscribers: usize,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        feed_availability: state.availability,
        subscribers: state.feed.subscriber_count(),
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Queries
// =============================================================================

async fn transactions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.snapshot())
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.stats())
}

// =============================================================================
// Live chain streams
// =============================================================================

fn require_chain(state: &AppState) -> Result<&ChainClient, ApiError> {
    match state.ready_chain() {
        Some(client) if state.availability.is_ready() => Ok(client),
        _ => {
            warn!(availability = %state.availability, "stream request rejected");
            Err(ApiError::ServiceUnavailable(state.availability))
        }
    }
}

/// Decode a JSON request body. Malformed bodies are a 400 in every handler.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "malformed request body");
        ApiError::BadRequest(e.to_string())
    })
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    #[serde(default)]
    stream_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeResponse {
    success: bool,
    stream_id: String,
}

async fn stream_subscribe(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_chain(&state)?;

    // An empty body asks for a generated stream id.
    let request: SubscribeRequest = if body.is_empty() {
        SubscribeRequest::default()
    } else {
        parse_body(&body)?
    };
    let stream_id = request
        .stream_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(stream_id = %stream_id, "stream subscription registered");
    Ok(Json(SubscribeResponse {
        success: true,
        stream_id,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest {
    stream_id: String,
    data: serde_json::Value,
}

async fn stream_publish(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let client = require_chain(&state)?;
    let request: PublishRequest = parse_body(&body)?;

    let ack = client.publish(&request.stream_id, &request.data)?;
    Ok((StatusCode::OK, Json(ack)))
}

// =============================================================================
// Tests
// =============================================================================
