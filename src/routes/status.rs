use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::{JobId, StatusReply};
use crate::models::prediction::WaitQuery;

const DEFAULT_WAIT_MS: u64 = 10_000;
const MAX_WAIT_MS: u64 = 60_000;

/// GET /status/{task_id} — Current state of a job. Unknown ids are `not_found`.
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<StatusReply> {
    let reply = match task_id.parse::<JobId>() {
        Ok(job_id) => state.jobs.status(&job_id),
        Err(_) => StatusReply::not_found(),
    };
    Json(reply)
}

/// GET /status/{task_id}/wait — Hold the request until the job finishes or
/// `timeout_ms` elapses, then answer like `get_status`.
pub async fn wait_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Json<StatusReply> {
    let Ok(job_id) = task_id.parse::<JobId>() else {
        return Json(StatusReply::not_found());
    };

    let timeout = Duration::from_millis(query.timeout_ms.unwrap_or(DEFAULT_WAIT_MS).min(MAX_WAIT_MS));
    Json(state.jobs.wait(&job_id, timeout).await)
}
