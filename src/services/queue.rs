use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::models::job::JobDescriptor;

/// Message carried through the queue. `Shutdown` is the poison value that
/// stops the worker once every job ahead of it has been processed.
#[derive(Debug)]
pub enum QueueMessage {
    Job(JobDescriptor),
    Shutdown,
}

/// Submission side of the in-process FIFO job queue.
///
/// Unbounded: enqueueing never waits on the worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: UnboundedSender<QueueMessage>,
    depth: Arc<AtomicUsize>,
}

/// Worker side of the queue.
pub struct JobReceiver {
    rx: UnboundedReceiver<QueueMessage>,
    depth: Arc<AtomicUsize>,
}

/// Create a connected queue / receiver pair.
pub fn channel() -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        JobQueue {
            tx,
            depth: Arc::clone(&depth),
        },
        JobReceiver { rx, depth },
    )
}

impl JobQueue {
    /// Enqueue a job. Fails only once the receiving worker has gone away.
    pub fn enqueue(&self, job: JobDescriptor) -> Result<(), QueueError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(QueueMessage::Job(job)).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }
        metrics::gauge!("job_queue_depth").set(self.depth() as f64);
        Ok(())
    }

    /// Ask the worker to stop after draining the jobs already queued.
    pub fn shutdown(&self) -> Result<(), QueueError> {
        self.tx
            .send(QueueMessage::Shutdown)
            .map_err(|_| QueueError::Closed)
    }

    /// Number of jobs waiting to be picked up.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobReceiver {
    /// Wait for the next message. `None` once every sender has been dropped.
    pub async fn dequeue(&mut self) -> Option<QueueMessage> {
        let message = self.rx.recv().await?;
        if let QueueMessage::Job(_) = message {
            let remaining = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            metrics::gauge!("job_queue_depth").set(remaining as f64);
        }
        Some(message)
    }

    /// Refuse further sends and hand back every job still buffered.
    ///
    /// Once this returns, `enqueue` on any `JobQueue` fails with
    /// `QueueError::Closed`, so no accepted job can be left behind.
    pub fn close(&mut self) -> Vec<JobDescriptor> {
        self.rx.close();
        let mut leftover = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let QueueMessage::Job(job) = message {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                leftover.push(job);
            }
        }
        metrics::gauge!("job_queue_depth").set(self.depth.load(Ordering::SeqCst) as f64);
        leftover
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is closed: the worker has stopped")]
    Closed,
}
