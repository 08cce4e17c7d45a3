// Preview backend: runs the whole edit path without the diffusion weights
//
// The denoising loop is replaced by a seeded noise blend computed with
// candle, so device placement, dtype handling and seeding behave like a real
// backend while outputs stay cheap to produce.

use crate::pipeline::{InferenceRequest, KontextPipeline, ModelSource, OffloadMode, PipelineLoader};
use crate::{KontextError, Result};
use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::Rng;
use std::path::PathBuf;

/// File fetched from the model repo to confirm the token grants access
const MODEL_INDEX: &str = "model_index.json";

/// Loads [`PreviewPipeline`]s
#[derive(Debug, Clone)]
pub struct PreviewLoader {
    use_cpu: bool,
    verify_hub_access: bool,
}

impl PreviewLoader {
    pub fn new(use_cpu: bool) -> Self {
        Self {
            use_cpu,
            verify_hub_access: true,
        }
    }

    /// Toggle fetching `model_index.json` from the Hub during load
    pub fn with_hub_check(mut self, verify: bool) -> Self {
        self.verify_hub_access = verify;
        self
    }

    fn fetch_model_index(&self, source: &ModelSource) -> Result<PathBuf> {
        let api = hf_hub::api::sync::ApiBuilder::new()
            .with_token(source.token.clone())
            .build()
            .map_err(|e| KontextError::HfHub(e.to_string()))?;

        api.model(source.repo_id.clone())
            .get(MODEL_INDEX)
            .map_err(|e| {
                KontextError::HfHub(format!(
                    "Failed to fetch {} from {}: {}",
                    MODEL_INDEX, source.repo_id, e
                ))
            })
    }

    fn select_device(&self, offload: OffloadMode) -> Result<Device> {
        if self.use_cpu {
            return Ok(Device::Cpu);
        }

        // Sequential offload keeps weights in host memory between layers
        match offload {
            OffloadMode::Model => Ok(Device::cuda_if_available(0)?),
            OffloadMode::Sequential => Ok(Device::Cpu),
        }
    }
}

impl PipelineLoader for PreviewLoader {
    fn clear_cache(&self) {
        tracing::debug!("Preview backend holds no cached device memory");
    }

    fn load(&self, source: &ModelSource, offload: OffloadMode) -> Result<Box<dyn KontextPipeline>> {
        if self.verify_hub_access {
            let index = self.fetch_model_index(source)?;
            tracing::info!("Resolved {} at {}", MODEL_INDEX, index.display());
        } else {
            tracing::debug!("Skipping Hub access check for {}", source.repo_id);
        }

        let device = self.select_device(offload)?;
        let dtype = if device.is_cuda() { source.dtype } else { DType::F32 };

        tracing::warn!(
            "Using preview backend - {} weights are not loaded, outputs are placeholders",
            source.repo_id
        );
        tracing::info!("Preview pipeline on {:?} ({:?}, {})", device, dtype, offload);

        Ok(Box::new(PreviewPipeline { device, dtype }))
    }
}

/// Stand-in pipeline producing a seeded perturbation of its input
pub struct PreviewPipeline {
    device: Device,
    dtype: DType,
}

impl PreviewPipeline {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            dtype: DType::F32,
        }
    }

    fn image_to_tensor(&self, image: &RgbImage) -> Result<Tensor> {
        let (width, height) = image.dimensions();
        let tensor = Tensor::from_vec(
            image.as_raw().clone(),
            (height as usize, width as usize, 3),
            &self.device,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1.0 / 255.0, 0.0)?
        .to_dtype(self.dtype)?;

        Ok(tensor)
    }

    fn tensor_to_image(&self, tensor: &Tensor) -> Result<RgbImage> {
        let tensor = tensor
            .to_dtype(DType::F32)?
            .clamp(0f32, 1f32)?
            .affine(255.0, 0.0)?
            .to_dtype(DType::U8)?
            .to_device(&Device::Cpu)?;

        let (_, height, width) = tensor.dims3()?;
        let data = tensor.permute((1, 2, 0))?.to_vec3::<u8>()?;
        let data: Vec<u8> = data.into_iter().flatten().flatten().collect();

        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width as u32, height as u32, data)
            .ok_or_else(|| KontextError::Inference("Failed to create image buffer".into()))
    }
}

/// Blend weight of the noise term: grows with guidance, shrinks with more steps
fn noise_strength(guidance_scale: f64, num_inference_steps: usize) -> f64 {
    let refinement = 1.0 + num_inference_steps as f64 / 28.0;
    (guidance_scale.max(0.0) * 0.04 / refinement).min(0.5)
}

impl KontextPipeline for PreviewPipeline {
    fn run(
        &mut self,
        request: &InferenceRequest<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<DynamicImage>> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(KontextError::Inference(format!(
                "Invalid working size {}x{}",
                width, height
            )));
        }

        tracing::info!("Prompt: {}", request.prompt);
        tracing::debug!(
            "Preview run at {}x{}, guidance {}, {} steps",
            width,
            height,
            request.guidance_scale,
            request.num_inference_steps
        );

        let input = if request.image.dimensions() == (width, height) {
            request.image.to_rgb8()
        } else {
            request
                .image
                .resize_exact(width, height, FilterType::Lanczos3)
                .to_rgb8()
        };

        let pixels = self.image_to_tensor(&input)?;

        let len = 3 * width as usize * height as usize;
        let noise: Vec<f32> = (0..len).map(|_| rng.gen::<f32>()).collect();
        let noise = Tensor::from_vec(noise, (3, height as usize, width as usize), &self.device)?
            .to_dtype(self.dtype)?;

        let strength = noise_strength(request.guidance_scale, request.num_inference_steps);
        let blended = (pixels.affine(1.0 - strength, 0.0)? + noise.affine(strength, 0.0)?)?;

        let output = self.tensor_to_image(&blended)?;
        Ok(vec![DynamicImage::ImageRgb8(output)])
    }
}
