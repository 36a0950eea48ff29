use std::path::PathBuf;

use image::RgbImage;

/// A loaded detection model, shared read-only across jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    /// Identifier the model was requested under ("fast", "accurate", ...).
    pub model_id: String,
    /// Backing weights location the identifier resolved to.
    pub path: PathBuf,
    /// Loader-specific token addressing the loaded model.
    pub token: String,
}

/// Output of one inference call.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Input image with detected regions drawn on it.
    pub annotated: RgbImage,
    /// Number of regions of interest found above the confidence threshold.
    pub count: u32,
}
