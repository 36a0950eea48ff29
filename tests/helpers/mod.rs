//! Test doubles for the model loader / detector and polling helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bone_scan::models::detection::{Detection, ModelHandle};
use bone_scan::models::job::{InferenceParams, JobId, JobRecord, StatusReply};
use bone_scan::services::cache::ModelRegistry;
use bone_scan::services::detector::{Detector, InferenceError, LoadError, ModelLoader};
use bone_scan::services::engine::Engine;
use bone_scan::services::gateway::JobGateway;
use bone_scan::services::worker::WorkerConfig;
use image::RgbImage;
use tokio::time::sleep;

/// Model id whose inference always fails.
pub const BROKEN_MODEL: &str = "broken";
/// Model id whose inference panics.
pub const PANIC_MODEL: &str = "panic";
/// Model id whose inference never returns.
pub const HANG_MODEL: &str = "hang";

/// Loader that counts calls and can be told to fail the first N loads of an id.
#[derive(Default)]
pub struct CountingLoader {
    pub delay: Duration,
    calls: AtomicUsize,
    loads: Mutex<Vec<(String, PathBuf)>>,
    failures_left: Mutex<HashMap<String, usize>>,
}

impl CountingLoader {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn fail_next(&self, model_id: &str, times: usize) {
        self.failures_left
            .lock()
            .unwrap()
            .insert(model_id.to_string(), times);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Vec<(String, PathBuf)> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    async fn load(&self, model_id: &str, path: &Path) -> Result<ModelHandle, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.loads
            .lock()
            .unwrap()
            .push((model_id.to_string(), path.to_path_buf()));

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        {
            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(model_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(LoadError::Failed {
                        model_id: model_id.to_string(),
                        path: path.display().to_string(),
                        reason: "weights file is corrupt".to_string(),
                    });
                }
            }
        }

        Ok(ModelHandle {
            model_id: model_id.to_string(),
            path: path.to_path_buf(),
            token: format!("stub:{}", model_id),
        })
    }
}

/// Detector that echoes its input with a fixed count and records call order.
pub struct EchoDetector {
    pub count: u32,
    pub delay: Duration,
    seen: Mutex<Vec<u32>>,
}

impl EchoDetector {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `params.width` of every job that reached inference, in call order.
    pub fn seen_widths(&self) -> Vec<u32> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Detector for EchoDetector {
    async fn detect(
        &self,
        model: &ModelHandle,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detection, InferenceError> {
        self.seen.lock().unwrap().push(params.width);

        match model.model_id.as_str() {
            BROKEN_MODEL => return Err(InferenceError::Failed("tensor shape mismatch".to_string())),
            PANIC_MODEL => panic!("detector blew up"),
            HANG_MODEL => sleep(Duration::from_secs(3600)).await,
            _ => {}
        }

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        Ok(Detection {
            annotated: image.clone(),
            count: self.count,
        })
    }
}

pub struct Harness {
    pub loader: Arc<CountingLoader>,
    pub detector: Arc<EchoDetector>,
    pub engine: Engine,
}

impl Harness {
    pub fn new(loader: CountingLoader, detector: EchoDetector) -> Self {
        Self::with_config(loader, detector, WorkerConfig::default())
    }

    pub fn with_config(loader: CountingLoader, detector: EchoDetector, config: WorkerConfig) -> Self {
        let loader = Arc::new(loader);
        let detector = Arc::new(detector);
        let engine = Engine::new(
            loader.clone(),
            detector.clone(),
            ModelRegistry::default(),
            config,
        );
        Self {
            loader,
            detector,
            engine,
        }
    }
}

/// Poll the gateway the way the front-end does until the job is terminal.
pub async fn poll_until_terminal(gateway: &JobGateway, job_id: &JobId, timeout: Duration) -> JobRecord {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match gateway.status(job_id) {
            StatusReply::Found(record) if record.is_terminal() => return record,
            StatusReply::Found(_) => {}
            StatusReply::NotFound { .. } => panic!("job {} disappeared", job_id),
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job {} did not finish within {:?}", job_id, timeout);
        }
        sleep(Duration::from_millis(10)).await;
    }
}
