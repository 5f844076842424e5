//! GitHub webhook handler: verifies deliveries and queues workflow_job events.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use actions_metrics::{EventQueue, WorkflowJobEvent};

use crate::config::ServerConfig;
use crate::github;

/// Handle an incoming GitHub webhook payload.
pub fn handle_webhook(
    config: &ServerConfig,
    queue: &EventQueue,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !github::validate_signature(&config.github_webhook_secret, &body, signature) {
        tracing::warn!("Webhook signature validation failed");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    match event_type {
        "workflow_job" => {
            let event: WorkflowJobEvent = serde_json::from_slice(&body).map_err(|e| {
                tracing::warn!("Malformed workflow_job payload: {e}");
                StatusCode::BAD_REQUEST
            })?;
            tracing::debug!(
                job_id = event.job_id(),
                action = event.action.as_str(),
                "Queueing workflow_job event"
            );
            if queue.submit(event) {
                Ok(StatusCode::ACCEPTED)
            } else {
                Err(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
        "ping" => {
            tracing::info!("Received GitHub ping webhook");
            Ok(StatusCode::OK)
        }
        _ => {
            tracing::debug!("Ignoring webhook event: {}", event_type);
            Ok(StatusCode::OK)
        }
    }
}
