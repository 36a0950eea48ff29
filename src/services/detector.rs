use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use image::RgbImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::detection::{Detection, ModelHandle};
use crate::models::job::InferenceParams;
use crate::services::imaging;

/// Constructs model handles. Loading is expensive and may take seconds.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_id: &str, path: &Path) -> Result<ModelHandle, LoadError>;
}

/// Runs a loaded model against a single RGB image.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        model: &ModelHandle,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detection, InferenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to load model '{model_id}' from {path}: {reason}")]
    Failed {
        model_id: String,
        path: String,
        reason: String,
    },

    #[error("Model server request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to decode input image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Failed(String),

    #[error("Model server request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct LoadRequest<'a> {
    model_id: &'a str,
    path: &'a str,
}

#[derive(Deserialize)]
struct LoadResponse {
    handle: String,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    handle: &'a str,
    image: String,
    imgsz: [u32; 2],
    conf: f32,
}

#[derive(Deserialize)]
struct PredictResponse {
    count: u32,
    image: String,
}

/// Client for an external model server that hosts the detection weights.
///
/// `load` asks the server to bring a weights file into memory and returns the
/// server-side handle; `detect` runs a prediction against that handle.
pub struct RemoteDetector {
    http: Client,
    base_url: String,
}

impl RemoteDetector {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelLoader for RemoteDetector {
    async fn load(&self, model_id: &str, path: &Path) -> Result<ModelHandle, LoadError> {
        let path_str = path.to_string_lossy();
        let response = self
            .http
            .post(format!("{}/models/load", self.base_url))
            .json(&LoadRequest {
                model_id,
                path: &path_str,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoadError::Failed {
                model_id: model_id.to_string(),
                path: path_str.into_owned(),
                reason: format!("status {}: {}", status, body),
            });
        }

        let loaded: LoadResponse = response.json().await?;
        Ok(ModelHandle {
            model_id: model_id.to_string(),
            path: path.to_path_buf(),
            token: loaded.handle,
        })
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    async fn detect(
        &self,
        model: &ModelHandle,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Detection, InferenceError> {
        let png = imaging::encode_png(image).map_err(|e| InferenceError::Failed(e.to_string()))?;

        let response = self
            .http
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest {
                handle: &model.token,
                image: base64::engine::general_purpose::STANDARD.encode(png),
                imgsz: [params.width, params.height],
                conf: params.conf,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Failed(format!("status {}: {}", status, body)));
        }

        let predicted: PredictResponse = response.json().await?;
        let annotated_bytes = base64::engine::general_purpose::STANDARD
            .decode(predicted.image.as_bytes())
            .map_err(|e| InferenceError::Failed(format!("invalid annotated image: {}", e)))?;

        Ok(Detection {
            annotated: imaging::decode_rgb(&annotated_bytes)?,
            count: predicted.count,
        })
    }
}
