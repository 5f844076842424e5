//! Prometheus exporter setup.

use std::net::SocketAddr;

use actions_metrics::{JobHistogram, DURATION_BUCKETS};
use metrics::counter;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(listen: SocketAddr) {
    let installed = PrometheusBuilder::new()
        .with_http_listener(listen)
        .set_buckets_for_metric(
            Matcher::Full(JobHistogram::QueueDuration.name().to_string()),
            DURATION_BUCKETS,
        )
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Full(JobHistogram::RunDuration.name().to_string()),
                DURATION_BUCKETS,
            )
        })
        .and_then(|builder| builder.install());

    match installed {
        Ok(()) => tracing::info!(%listen, "Prometheus exporter listening"),
        Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
    }
}

/// Record a webhook delivery, by `X-GitHub-Event`.
pub fn webhook_received(event_type: &str) {
    counter!("github_webhooks_received_total", "event" => event_type.to_string()).increment(1);
}
