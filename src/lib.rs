// kontext-studio - FLUX Kontext image editing service
// Picks an offload strategy from free VRAM, runs edits at a Flux-friendly
// resolution and restores the original size afterwards.

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod provision;
pub mod resolution;
pub mod server;

pub use config::ServiceConfig;
pub use error::{KontextError, Result};
pub use executor::{edit_image, EditExecutor, EditOptions, ImageInput};
pub use pipeline::{InferenceRequest, KontextPipeline, ModelSource, OffloadMode, PipelineLoader};
pub use preview::{PreviewLoader, PreviewPipeline};
pub use probe::{DeviceProbe, MemoryProbe, MemoryReading, NvidiaSmiProbe};
pub use provision::{ModelHandle, Provisioner};
pub use resolution::{plan, Dimensions};
