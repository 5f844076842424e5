//! HTTP routes: the GitHub webhook plus a couple of operational endpoints.

pub mod webhook;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

use actions_metrics::{EventQueue, InProgressRegistry, InProgressSnapshot};

use crate::config::ServerConfig;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub queue: EventQueue,
    pub registry: Arc<InProgressRegistry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/github", post(webhook_handler))
        .route("/debug/in_progress", get(in_progress_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    crate::metrics::webhook_received(
        headers
            .get("x-github-event")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown"),
    );

    webhook::handle_webhook(&state.config, &state.queue, &headers, body)
}

async fn in_progress_handler(State(state): State<AppState>) -> Json<Vec<InProgressSnapshot>> {
    Json(state.registry.snapshot(Instant::now()))
}
