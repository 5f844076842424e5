//! actions-metrics: Prometheus metrics for GitHub Actions workflow jobs.
//!
//! Receives `workflow_job` webhooks, counts job lifecycle transitions,
//! scrapes finished job logs for queue/run durations and exit codes, and
//! accrues running time for jobs still in progress.

mod config;
mod github;
mod metrics;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use actions_metrics::{event_queue, EventProcessor, InProgressRegistry, MetricsSink, PrometheusSink};
use clap::Parser;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "actions-metrics", about = "GitHub Actions workflow job metrics exporter")]
struct Cli {
    /// Webhook server port
    #[arg(short, long, env = "ACTIONS_METRICS_PORT", default_value = "8080")]
    port: u16,

    /// Prometheus scrape port
    #[arg(long, env = "ACTIONS_METRICS_METRICS_PORT", default_value = "9102")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    tracing::info!("Starting actions metrics server...");

    metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], cli.metrics_port)));
    let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink::new());

    let config = config::ServerConfig::from_env();
    let reader_config = config.reader_config();
    let fetcher = github::log_fetcher(&config, reader_config.log_fetch_timeout)?;

    let registry = Arc::new(InProgressRegistry::new());
    let processor = EventProcessor::new(registry.clone(), sink, fetcher);
    let (queue, reader) = event_queue(processor, reader_config);

    let (stop, shutdown) = watch::channel(false);
    let reader_task = tokio::spawn(reader.run(shutdown));

    let app = routes::router(routes::AppState {
        config: Arc::new(config),
        queue,
        registry,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Webhook server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping event reader...");
    let _ = stop.send(true);
    if let Err(e) = reader_task.await {
        tracing::error!("Event reader task failed: {e}");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
