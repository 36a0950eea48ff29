use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::models::job::{JobDescriptor, JobRecord};
use crate::services::cache::ResourceCache;
use crate::services::detector::{Detector, InferenceError, LoadError};
use crate::services::imaging::{self, EncodeError};
use crate::services::queue::{JobReceiver, QueueMessage};
use crate::services::results::ResultStore;

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Upper bound on a single job. `None` lets a job run for as long as it takes.
    pub job_timeout: Option<Duration>,
}

/// Everything that can end a job in the `error` state.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Inference task panicked")]
    Panicked,

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Worker stopped before the job was processed")]
    WorkerStopped,
}

/// Successful job output, ready to publish.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub image: String,
    pub count: u32,
}

/// Single background consumer of the job queue.
///
/// Jobs run strictly one at a time in submission order. A failing job is
/// recorded as `error` and the loop moves on; only the shutdown sentinel (or
/// the queue closing) ends it.
pub struct Worker {
    receiver: JobReceiver,
    cache: Arc<ResourceCache>,
    detector: Arc<dyn Detector>,
    results: Arc<ResultStore>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        receiver: JobReceiver,
        cache: Arc<ResourceCache>,
        detector: Arc<dyn Detector>,
        results: Arc<ResultStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            receiver,
            cache,
            detector,
            results,
            config,
        }
    }

    pub async fn run(mut self) {
        info!("Worker ready, starting job processing loop");

        while let Some(message) = self.receiver.dequeue().await {
            match message {
                QueueMessage::Job(job) => self.handle(job).await,
                QueueMessage::Shutdown => {
                    info!("Shutdown sentinel received");
                    break;
                }
            }
        }

        // Anything queued behind the sentinel will never run.
        for job in self.receiver.close() {
            warn!(job_id = %job.job_id, "Job left in queue at shutdown");
            metrics::counter!("jobs_failed_total", "model" => job.model_id).increment(1);
            let record = JobRecord::Error {
                message: JobError::WorkerStopped.to_string(),
            };
            if let Err(e) = self.results.complete(job.job_id, record) {
                warn!(job_id = %job.job_id, error = %e, "Could not publish job result");
            }
        }

        info!("Worker stopped");
    }

    async fn handle(&self, job: JobDescriptor) {
        let job_id = job.job_id;
        let model_id = job.model_id.clone();
        let waited_ms = self
            .results
            .submitted_at(&job_id)
            .map(|at| (Utc::now() - at).num_milliseconds());

        info!(
            job_id = %job_id,
            model_id = %model_id,
            waited_ms = ?waited_ms,
            width = job.params.width,
            height = job.params.height,
            conf = job.params.conf,
            bytes = job.payload.len(),
            "Processing detection job"
        );

        let start = Instant::now();
        let record = match self.execute(job).await {
            Ok(output) => {
                info!(
                    job_id = %job_id,
                    count = output.count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Job completed successfully"
                );
                metrics::counter!("jobs_completed_total", "model" => model_id).increment(1);
                JobRecord::Completed {
                    image: output.image,
                    count: output.count,
                }
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job processing failed");
                metrics::counter!("jobs_failed_total", "model" => model_id).increment(1);
                JobRecord::Error {
                    message: e.to_string(),
                }
            }
        };
        metrics::histogram!("job_processing_seconds").record(start.elapsed().as_secs_f64());

        if let Err(e) = self.results.complete(job_id, record) {
            warn!(job_id = %job_id, error = %e, "Could not publish job result");
        }
    }

    /// Run the job pipeline on its own task so a panic or the deadline only
    /// takes down that job.
    async fn execute(&self, job: JobDescriptor) -> Result<JobOutput, JobError> {
        let mut task = tokio::spawn(process_job(
            Arc::clone(&self.cache),
            Arc::clone(&self.detector),
            job,
        ));

        let joined = match self.config.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(JobError::Timeout(limit));
                }
            },
            None => task.await,
        };

        joined.map_err(JobError::from_join)?
    }
}

impl JobError {
    fn from_join(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            JobError::Panicked
        } else {
            JobError::Cancelled
        }
    }
}

/// RESOLVE_RESOURCE -> RUN_INFERENCE -> ENCODE_OUTPUT for one job.
async fn process_job(
    cache: Arc<ResourceCache>,
    detector: Arc<dyn Detector>,
    job: JobDescriptor,
) -> Result<JobOutput, JobError> {
    let model = cache.resolve(&job.model_id).await?;

    debug!(job_id = %job.job_id, "Decoding input image");
    let payload = job.payload;
    let image = tokio::task::spawn_blocking(move || imaging::decode_rgb(&payload))
        .await
        .map_err(JobError::from_join)?
        .map_err(InferenceError::Decode)?;

    debug!(job_id = %job.job_id, path = %model.path.display(), "Running inference");
    let detection = detector.detect(&model, &image, &job.params).await?;

    debug!(job_id = %job.job_id, "Encoding annotated image");
    let annotated = detection.annotated;
    let encoded = tokio::task::spawn_blocking(move || imaging::encode_base64_jpeg(&annotated))
        .await
        .map_err(JobError::from_join)??;

    Ok(JobOutput {
        image: encoded,
        count: detection.count,
    })
}
