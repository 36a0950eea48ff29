use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::models::job::{InferenceParams, JobDescriptor, JobId, StatusReply};
use crate::services::cache::ResourceCache;
use crate::services::queue::{JobQueue, QueueError};
use crate::services::results::ResultStore;

/// Submission and status entry point used by the HTTP layer.
///
/// Cheap to clone; every clone talks to the same queue and result table.
#[derive(Clone)]
pub struct JobGateway {
    queue: JobQueue,
    results: Arc<ResultStore>,
    cache: Arc<ResourceCache>,
}

impl JobGateway {
    pub fn new(queue: JobQueue, results: Arc<ResultStore>, cache: Arc<ResourceCache>) -> Self {
        Self {
            queue,
            results,
            cache,
        }
    }

    /// Accept a job and return its id without waiting for processing.
    pub fn submit(
        &self,
        model_id: impl Into<String>,
        payload: Vec<u8>,
        params: InferenceParams,
    ) -> Result<JobId, SubmitError> {
        let job_id = JobId::new();
        let model_id = model_id.into();
        let bytes = payload.len();

        self.results.insert_pending(job_id);

        let descriptor = JobDescriptor {
            job_id,
            model_id: model_id.clone(),
            payload,
            params,
        };
        if let Err(e) = self.queue.enqueue(descriptor) {
            self.results.remove(&job_id);
            return Err(e.into());
        }

        metrics::counter!("jobs_submitted_total", "model" => model_id.clone()).increment(1);
        info!(
            job_id = %job_id,
            model_id = %model_id,
            bytes,
            queue_depth = self.queue.depth(),
            "Job accepted"
        );

        Ok(job_id)
    }

    /// Immediate read of the job's current state.
    pub fn status(&self, job_id: &JobId) -> StatusReply {
        self.results.get(job_id).into()
    }

    /// Like [`status`](Self::status) but waits up to `timeout` for a terminal state.
    pub async fn wait(&self, job_id: &JobId, timeout: Duration) -> StatusReply {
        self.results.wait(job_id, timeout).await.into()
    }

    /// Drop terminal records that finished more than `ttl` ago.
    pub fn evict_finished_older_than(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let evicted = self.results.evict_finished_before(chrono::Utc::now() - ttl);
        if evicted > 0 {
            debug!(evicted, remaining = self.results.len(), "Evicted finished job records");
        }
        evicted
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// False once the worker has stopped consuming the queue.
    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    pub fn loaded_models(&self) -> Option<Vec<String>> {
        self.cache.try_loaded_ids()
    }

    pub fn tracked_jobs(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    QueueClosed(#[from] QueueError),
}
