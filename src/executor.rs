// Edit execution: resolve input, plan working size, infer, restore size

use crate::pipeline::{InferenceRequest, KontextPipeline};
use crate::provision::ModelHandle;
use crate::resolution::{self, Dimensions, DEFAULT_TARGET_PIXELS};
use crate::{KontextError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_GUIDANCE_SCALE: f64 = 2.5;
pub const DEFAULT_INFERENCE_STEPS: usize = 28;

/// Upper bound on fetching one remote image
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resampling filter for both the downscale and the restore
const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Image to edit
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Local path or http(s) URL
    Source(String),
    /// Image that is already decoded
    Decoded(DynamicImage),
}

impl From<String> for ImageInput {
    fn from(source: String) -> Self {
        Self::Source(source)
    }
}

impl From<&str> for ImageInput {
    fn from(source: &str) -> Self {
        Self::Source(source.to_string())
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

impl TryFrom<Value> for ImageInput {
    type Error = KontextError;

    fn try_from(value: Value) -> Result<Self> {
        let kind = match value {
            Value::String(source) if source.trim().is_empty() => {
                return Err(KontextError::InvalidInputKind("image reference is empty".into()))
            }
            Value::String(source) => return Ok(Self::Source(source)),
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };

        Err(KontextError::InvalidInputKind(format!(
            "expected a path or URL string, got {}",
            kind
        )))
    }
}

/// Per-edit parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EditOptions {
    pub prompt: String,
    pub guidance_scale: f64,
    pub num_inference_steps: usize,
    pub target_pixels: u64,
    /// Fixed seed for reproducible output; `None` draws from entropy
    pub seed: Option<u64>,
}

impl EditOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            target_pixels: DEFAULT_TARGET_PIXELS,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

fn generator(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Decode encoded image bytes into an RGB image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Run one edit on an already-resolved image.
///
/// The image is resized to the planned working resolution, passed through
/// the pipeline, and the first output is brought back to the original size.
pub fn edit_image(
    pipeline: &mut dyn KontextPipeline,
    image: DynamicImage,
    options: &EditOptions,
) -> Result<DynamicImage> {
    let original = Dimensions::from(image.dimensions());
    if original.width == 0 || original.height == 0 {
        return Err(KontextError::ImageLoad(format!("image has no pixels ({})", original)));
    }

    let run = resolution::plan(original.width, original.height, options.target_pixels);
    tracing::info!("Original size {} -> model size {}", original, run);

    let input = image.resize_exact(run.width, run.height, RESAMPLE_FILTER);
    let mut rng = generator(options.seed);

    tracing::info!("Running inference ({} steps)", options.num_inference_steps);
    let request = InferenceRequest {
        prompt: &options.prompt,
        image: &input,
        guidance_scale: options.guidance_scale,
        num_inference_steps: options.num_inference_steps,
        width: run.width,
        height: run.height,
    };
    let output = pipeline
        .run(&request, &mut rng)?
        .into_iter()
        .next()
        .ok_or_else(|| KontextError::Inference("pipeline returned no images".into()))?;

    let produced = Dimensions::from(output.dimensions());
    if produced == original {
        return Ok(output);
    }

    tracing::info!("Resizing result from {} back to {}", produced, original);
    Ok(output.resize_exact(original.width, original.height, RESAMPLE_FILTER))
}

/// Resolves inputs and runs edits against a [`ModelHandle`]
#[derive(Debug, Clone)]
pub struct EditExecutor {
    http: reqwest::Client,
}

impl EditExecutor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Executor whose remote fetches give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch a URL, read a local file, or pass a decoded image through
    pub async fn resolve(&self, input: ImageInput) -> Result<DynamicImage> {
        match input {
            ImageInput::Decoded(image) => Ok(image),
            ImageInput::Source(url) if is_remote(&url) => {
                tracing::debug!("Fetching image from {}", url);
                let bytes = self
                    .http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                decode_image(&bytes)
            }
            ImageInput::Source(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    KontextError::ImageLoad(format!("Failed to read '{}': {}", path, e))
                })?;
                decode_image(&bytes)
            }
        }
    }

    /// Resolve `input` and edit it once the pipeline is free.
    ///
    /// Inference runs on a blocking worker while holding the handle's lock.
    pub async fn edit(
        &self,
        handle: &ModelHandle,
        input: ImageInput,
        options: &EditOptions,
    ) -> Result<DynamicImage> {
        let image = self.resolve(input).await?;

        let mut pipeline = handle.acquire().await;
        let options = options.clone();
        tokio::task::spawn_blocking(move || edit_image(&mut **pipeline, image, &options))
            .await
            .map_err(|e| KontextError::Inference(format!("inference task failed: {}", e)))?
    }
}
