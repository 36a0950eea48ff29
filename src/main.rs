use std::sync::Arc;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use bone_scan::app_state::AppState;
use bone_scan::config::AppConfig;
use bone_scan::routes;
use bone_scan::services::detector::RemoteDetector;
use bone_scan::services::engine::{self, Engine};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing bone-scan server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("jobs_submitted_total", "Total detection jobs submitted");
    metrics::describe_counter!("jobs_completed_total", "Total detection jobs completed");
    metrics::describe_counter!("jobs_failed_total", "Total detection jobs that failed");
    metrics::describe_histogram!(
        "job_processing_seconds",
        "Time to process a detection job"
    );
    metrics::describe_gauge!(
        "job_queue_depth",
        "Current number of pending jobs in the queue"
    );
    metrics::describe_counter!(
        "model_cold_loads_total",
        "Models loaded into memory, by identifier"
    );
    metrics::describe_counter!(
        "model_fallback_total",
        "Model requests for unknown identifiers served by the default weights"
    );

    // Model server client doubles as loader and detector
    tracing::info!(url = %config.inference_url, "Initializing model server client");
    let remote = Arc::new(RemoteDetector::new(&config.inference_url));

    let engine = Engine::new(
        remote.clone(),
        remote,
        config.model_registry(),
        config.worker_config(),
    );
    let (jobs, worker) = engine.start();

    if let Some(ttl) = config.result_ttl() {
        tracing::info!(ttl_secs = ttl.as_secs(), "Finished job records will be evicted");
        engine::spawn_eviction(jobs.clone(), ttl, config.eviction_interval());
    }

    let state = AppState::new(jobs);

    let app = routes::router(state, config.max_upload_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );
    let app = routes::with_http_layers(app);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if let Err(e) = worker.shutdown().await {
        tracing::error!(error = %e, "Worker did not stop cleanly");
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
