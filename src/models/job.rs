use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Opaque identifier handed back to clients on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-job inference parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Target inference width in pixels.
    pub width: u32,
    /// Target inference height in pixels.
    pub height: u32,
    /// Minimum confidence for a detection to be counted (0.0 - 1.0).
    pub conf: f32,
}

/// A unit of work travelling from the gateway to the worker.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub model_id: String,
    pub payload: Vec<u8>,
    pub params: InferenceParams,
}

/// Status tag as exposed to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Error,
    NotFound,
}

/// Lifecycle state of a submitted job.
///
/// Created as `Pending`, then written exactly once to `Completed` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobRecord {
    Pending,
    Completed {
        /// Annotated output, base64-encoded JPEG.
        image: String,
        count: u32,
    },
    Error {
        message: String,
    },
}

impl JobRecord {
    pub fn status(&self) -> JobStatus {
        match self {
            JobRecord::Pending => JobStatus::Pending,
            JobRecord::Completed { .. } => JobStatus::Completed,
            JobRecord::Error { .. } => JobStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobRecord::Pending)
    }
}

/// Answer to a status query: either a known record or the not-found sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusReply {
    Found(JobRecord),
    NotFound { status: JobStatus },
}

impl StatusReply {
    pub fn not_found() -> Self {
        StatusReply::NotFound {
            status: JobStatus::NotFound,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            StatusReply::Found(record) => record.status(),
            StatusReply::NotFound { .. } => JobStatus::NotFound,
        }
    }

    pub fn record(&self) -> Option<&JobRecord> {
        match self {
            StatusReply::Found(record) => Some(record),
            StatusReply::NotFound { .. } => None,
        }
    }
}

impl From<Option<JobRecord>> for StatusReply {
    fn from(record: Option<JobRecord>) -> Self {
        record.map_or_else(StatusReply::not_found, StatusReply::Found)
    }
}
