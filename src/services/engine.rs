use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::services::cache::{ModelRegistry, ResourceCache};
use crate::services::detector::{Detector, ModelLoader};
use crate::services::gateway::JobGateway;
use crate::services::queue::{self, JobQueue};
use crate::services::results::ResultStore;
use crate::services::worker::{Worker, WorkerConfig};

/// The job-processing kernel: queue, model cache and result table, plus the
/// worker that ties them together. Built once at startup.
pub struct Engine {
    gateway: JobGateway,
    worker: Worker,
}

impl Engine {
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        detector: Arc<dyn Detector>,
        registry: ModelRegistry,
        config: WorkerConfig,
    ) -> Self {
        let (queue, receiver) = queue::channel();
        let cache = Arc::new(ResourceCache::new(loader, registry));
        let results = Arc::new(ResultStore::new());

        let worker = Worker::new(
            receiver,
            Arc::clone(&cache),
            detector,
            Arc::clone(&results),
            config,
        );

        Self {
            gateway: JobGateway::new(queue, results, cache),
            worker,
        }
    }

    pub fn gateway(&self) -> JobGateway {
        self.gateway.clone()
    }

    /// Spawn the background worker. Jobs submitted before this are kept and
    /// processed once it starts.
    pub fn start(self) -> (JobGateway, WorkerHandle) {
        let handle = WorkerHandle {
            queue: self.gateway.queue().clone(),
            task: tokio::spawn(self.worker.run()),
        };
        (self.gateway, handle)
    }
}

/// Owner of the running worker task.
pub struct WorkerHandle {
    queue: JobQueue,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Cooperative stop: queue the sentinel behind any pending jobs and wait
    /// for the worker to drain them and exit.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        info!(pending = self.queue.depth(), "Stopping worker");
        // A closed queue means the worker is already gone; just reap it.
        let _ = self.queue.shutdown();
        self.task.await.map_err(|_| EngineError::WorkerCrashed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Periodically drop finished job records older than `ttl`.
pub fn spawn_eviction(gateway: JobGateway, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            gateway.evict_finished_older_than(ttl);
        }
    })
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Worker task terminated abnormally")]
    WorkerCrashed,
}
