// Pipeline backend seam: what the orchestration layer needs from a model

use crate::Result;
use candle_core::DType;
use image::DynamicImage;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// FLUX.1 Kontext dev weights on the HuggingFace Hub
pub const KONTEXT_DEV_REPO: &str = "black-forest-labs/FLUX.1-Kontext-dev";

/// How much of the model stays resident on the accelerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffloadMode {
    /// Whole sub-modules move to the device when needed (coarse, faster)
    Model,
    /// Layers stream through the device one at a time (fine-grained, smallest peak)
    Sequential,
}

impl OffloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model_cpu_offload",
            Self::Sequential => "sequential_cpu_offload",
        }
    }
}

impl fmt::Display for OffloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to load model weights from
#[derive(Clone)]
pub struct ModelSource {
    pub repo_id: String,
    pub dtype: DType,
    pub token: Option<String>,
}

impl ModelSource {
    pub fn new(repo_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            dtype: DType::BF16,
            token,
        }
    }

    /// Build a source whose token comes from the environment variable `token_env`
    pub fn from_env(repo_id: impl Into<String>, token_env: &str) -> Self {
        let token = std::env::var(token_env).ok().filter(|t| !t.is_empty());
        Self::new(repo_id, token)
    }
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSource")
            .field("repo_id", &self.repo_id)
            .field("dtype", &self.dtype)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A single inference call at working resolution
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    pub prompt: &'a str,
    /// Input image, already resized to `width` x `height`
    pub image: &'a DynamicImage,
    pub guidance_scale: f64,
    pub num_inference_steps: usize,
    pub width: u32,
    pub height: u32,
}

/// A loaded image-editing model
///
/// Implementations are not required to be re-entrant; callers serialize
/// access through [`crate::ModelHandle`].
pub trait KontextPipeline: Send {
    /// Run inference and return the produced images (first one is used)
    fn run(
        &mut self,
        request: &InferenceRequest<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<DynamicImage>>;
}

/// Constructs pipelines for a given offload strategy
pub trait PipelineLoader: Send + Sync {
    /// Release cached accelerator memory left over from earlier work
    fn clear_cache(&self) {}

    fn load(&self, source: &ModelSource, offload: OffloadMode)
        -> Result<Box<dyn KontextPipeline>>;
}
