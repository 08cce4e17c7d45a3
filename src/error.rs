// Error types for kontext-studio

use thiserror::Error;

/// Result type for kontext-studio operations
pub type Result<T> = std::result::Result<T, KontextError>;

/// Errors that can occur while provisioning or running an edit
#[derive(Error, Debug)]
pub enum KontextError {
    /// Device query failed; only ever recovered inside the probe
    #[error("Device probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("Invalid image input: {0}")]
    InvalidInputKind(String),

    #[error("Model not ready: {0}")]
    ModelNotReady(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image loading error: {0}")]
    ImageLoad(String),

    #[error("Image fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Model loading error: {0}")]
    ModelLoading(String),

    #[error("HuggingFace Hub error: {0}")]
    HfHub(String),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<image::ImageError> for KontextError {
    fn from(err: image::ImageError) -> Self {
        KontextError::ImageLoad(err.to_string())
    }
}

impl From<toml::de::Error> for KontextError {
    fn from(err: toml::de::Error) -> Self {
        KontextError::Config(err.to_string())
    }
}
