use std::time::Instant;

use crate::services::gateway::JobGateway;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobGateway,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(jobs: JobGateway) -> Self {
        Self {
            jobs,
            started_at: Instant::now(),
        }
    }
}
