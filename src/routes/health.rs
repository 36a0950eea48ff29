use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub worker: ComponentHealth,
    pub queue_depth: usize,
    pub tracked_jobs: usize,
    /// `None` while a model load is in progress.
    pub loaded_models: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

/// GET /health — worker liveness and queue/cache summary.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let worker_alive = state.jobs.is_accepting();

    let status_code = if worker_alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if worker_alive { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        checks: HealthChecks {
            worker: ComponentHealth {
                status: if worker_alive { "ok" } else { "stopped" }.to_string(),
            },
            queue_depth: state.jobs.queue_depth(),
            tracked_jobs: state.jobs.tracked_jobs(),
            loaded_models: state.jobs.loaded_models(),
        },
    };

    (status_code, Json(response))
}
