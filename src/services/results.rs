use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::models::job::{JobId, JobRecord};

struct Entry {
    record: watch::Sender<JobRecord>,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(record: JobRecord) -> Self {
        let finished_at = record.is_terminal().then(Utc::now);
        let (tx, _rx) = watch::channel(record);
        Self {
            record: tx,
            submitted_at: Utc::now(),
            finished_at,
        }
    }

    fn current(&self) -> JobRecord {
        self.record.borrow().clone()
    }
}

/// Job id -> record table shared by the gateway and the worker.
///
/// Every read and write goes through one mutex that is held only for the map
/// operation itself. Each entry also carries a watch channel so callers can
/// wait for the terminal write instead of polling.
#[derive(Default)]
pub struct ResultStore {
    entries: Mutex<HashMap<JobId, Entry>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a freshly submitted job. An id that is already tracked is left alone.
    pub fn insert_pending(&self, job_id: JobId) {
        self.lock()
            .entry(job_id)
            .or_insert_with(|| Entry::new(JobRecord::Pending));
    }

    /// Write a record. A terminal record is never replaced.
    pub fn put(&self, job_id: JobId, record: JobRecord) -> Result<(), ResultError> {
        let mut entries = self.lock();
        match entries.get_mut(&job_id) {
            Some(entry) if entry.record.borrow().is_terminal() => {
                Err(ResultError::AlreadyTerminal(job_id))
            }
            Some(entry) => {
                if record.is_terminal() {
                    entry.finished_at = Some(Utc::now());
                }
                entry.record.send_replace(record);
                Ok(())
            }
            None => {
                entries.insert(job_id, Entry::new(record));
                Ok(())
            }
        }
    }

    /// Move a pending job to its terminal state. A job is finished exactly once.
    pub fn complete(&self, job_id: JobId, record: JobRecord) -> Result<(), ResultError> {
        if !record.is_terminal() {
            return Err(ResultError::NotTerminal(job_id));
        }

        let mut entries = self.lock();
        let entry = entries
            .get_mut(&job_id)
            .ok_or(ResultError::UnknownJob(job_id))?;
        if entry.record.borrow().is_terminal() {
            return Err(ResultError::AlreadyTerminal(job_id));
        }

        entry.finished_at = Some(Utc::now());
        entry.record.send_replace(record);
        Ok(())
    }

    /// Current record, or `None` if the id is unknown.
    pub fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        self.lock().get(job_id).map(Entry::current)
    }

    pub fn remove(&self, job_id: &JobId) -> Option<JobRecord> {
        self.lock().remove(job_id).map(|entry| entry.current())
    }

    /// Wait up to `timeout` for the job to reach a terminal state and return
    /// whatever the record is at that point.
    pub async fn wait(&self, job_id: &JobId, timeout: Duration) -> Option<JobRecord> {
        let mut rx = {
            let entries = self.lock();
            entries.get(job_id)?.record.subscribe()
        };

        // A timeout or a removed entry both fall through to the last value seen.
        let _ = tokio::time::timeout(timeout, rx.wait_for(JobRecord::is_terminal)).await;
        let record = rx.borrow().clone();
        Some(record)
    }

    /// Drop terminal records finished before `cutoff`. Pending jobs are kept.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.finished_at.map_or(true, |at| at >= cutoff));
        before - entries.len()
    }

    /// When the job was accepted, if it is still tracked.
    pub fn submitted_at(&self, job_id: &JobId) -> Option<DateTime<Utc>> {
        self.lock().get(job_id).map(|entry| entry.submitted_at)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.finished_at.is_none())
            .count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("Job {0} is not tracked")]
    UnknownJob(JobId),

    #[error("Job {0} already reached a terminal state")]
    AlreadyTerminal(JobId),

    #[error("Refusing to finish job {0} with a non-terminal record")]
    NotTerminal(JobId),
}
