use std::time::Duration;

use serde::Deserialize;

use crate::services::cache::{ModelRegistry, ACCURATE_MODEL_ID, FAST_MODEL_ID};
use crate::services::worker::WorkerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "127.0.0.1:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the model server that hosts the detection weights.
    #[serde(default = "default_inference_url")]
    pub inference_url: String,

    /// Weights behind the "fast" model identifier
    #[serde(default = "default_fast_path")]
    pub model_fast_path: String,

    /// Weights behind the "accurate" model identifier
    #[serde(default = "default_accurate_path")]
    pub model_accurate_path: String,

    /// Weights used for any unrecognized model identifier
    #[serde(default = "default_model_path")]
    pub model_default_path: String,

    /// How long finished job records are kept, in seconds. 0 keeps them forever.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// How often the eviction sweep runs, in seconds.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Optional per-job deadline in seconds. Unset means no deadline.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_inference_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_fast_path() -> String {
    "yolo11n_custom.pt".to_string()
}

fn default_accurate_path() -> String {
    "yolo11l_custom.pt".to_string()
}

fn default_model_path() -> String {
    "yolo11n.pt".to_string()
}

fn default_result_ttl_secs() -> u64 {
    3600
}

fn default_eviction_interval_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn model_registry(&self) -> ModelRegistry {
        ModelRegistry::new(&self.model_default_path)
            .with_model(FAST_MODEL_ID, &self.model_fast_path)
            .with_model(ACCURATE_MODEL_ID, &self.model_accurate_path)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            job_timeout: self
                .job_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Retention for finished results, `None` when eviction is disabled.
    pub fn result_ttl(&self) -> Option<Duration> {
        (self.result_ttl_secs > 0).then(|| Duration::from_secs(self.result_ttl_secs))
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs.max(1))
    }
}
