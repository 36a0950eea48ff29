use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{InferenceParams, JobId};

/// Text fields of a `POST /predict` upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PredictForm {
    #[garde(length(min = 1, max = 64))]
    pub model_type: String,

    #[garde(range(min = 1, max = 4096))]
    pub imgsz_w: u32,

    #[garde(range(min = 1, max = 4096))]
    pub imgsz_h: u32,

    #[garde(custom(finite), range(min = 0.0, max = 1.0))]
    pub conf: f32,
}

// NaN slips past both range bounds.
fn finite(value: &f32, _ctx: &()) -> garde::Result {
    if value.is_finite() {
        Ok(())
    } else {
        Err(garde::Error::new("must be a finite number"))
    }
}

impl PredictForm {
    pub fn params(&self) -> InferenceParams {
        InferenceParams {
            width: self.imgsz_w,
            height: self.imgsz_h,
            conf: self.conf,
        }
    }
}

/// Response after submitting an image for analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub task_id: JobId,
}

/// Query string of the long-poll status endpoint.
#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    pub timeout_ms: Option<u64>,
}
