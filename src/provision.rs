// One-time pipeline provisioning and the shared model handle

use crate::pipeline::{KontextPipeline, ModelSource, OffloadMode, PipelineLoader};
use crate::probe::{DeviceProbe, MemoryProbe};
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Free VRAM needed to keep whole sub-modules resident (~26 GB)
pub const VRAM_THRESHOLD_MB: u64 = 26 * 1024;

/// Choose the offload strategy for a probe result.
///
/// Only a successful reading at or above `threshold_mb` earns the coarse
/// strategy; an unavailable probe falls back to sequential offload.
pub fn select_offload(memory: &MemoryProbe, threshold_mb: u64) -> OffloadMode {
    match memory {
        MemoryProbe::Reading(reading) if reading.free_mb >= threshold_mb => OffloadMode::Model,
        _ => OffloadMode::Sequential,
    }
}

/// Shared handle to the loaded pipeline
///
/// Clones share one pipeline. Inference through the handle is serialized:
/// only one request runs on the device at a time.
#[derive(Clone)]
pub struct ModelHandle {
    pipeline: Arc<Mutex<Box<dyn KontextPipeline>>>,
    offload: OffloadMode,
    memory: MemoryProbe,
}

impl ModelHandle {
    pub fn new(
        pipeline: Box<dyn KontextPipeline>,
        offload: OffloadMode,
        memory: MemoryProbe,
    ) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            offload,
            memory,
        }
    }

    pub fn offload_mode(&self) -> OffloadMode {
        self.offload
    }

    /// Memory observed when the pipeline was provisioned
    pub fn memory(&self) -> &MemoryProbe {
        &self.memory
    }

    /// Wait for exclusive use of the pipeline
    pub async fn acquire(&self) -> OwnedMutexGuard<Box<dyn KontextPipeline>> {
        Arc::clone(&self.pipeline).lock_owned().await
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("offload", &self.offload)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

/// Builds the model handle once at startup
pub struct Provisioner {
    probe: Box<dyn DeviceProbe>,
    loader: Box<dyn PipelineLoader>,
    threshold_mb: u64,
}

impl Provisioner {
    pub fn new(probe: Box<dyn DeviceProbe>, loader: Box<dyn PipelineLoader>) -> Self {
        Self {
            probe,
            loader,
            threshold_mb: VRAM_THRESHOLD_MB,
        }
    }

    pub fn with_threshold_mb(mut self, threshold_mb: u64) -> Self {
        self.threshold_mb = threshold_mb;
        self
    }

    /// Clear caches, probe the device, pick an offload strategy and load.
    ///
    /// A failed probe is not an error; loader failures are.
    pub fn provision(&self, source: &ModelSource) -> Result<ModelHandle> {
        self.loader.clear_cache();

        let memory = self.probe.probe();
        let offload = select_offload(&memory, self.threshold_mb);

        tracing::info!("Loading {} ({:?})", source.repo_id, source.dtype);
        let pipeline = self.loader.load(source, offload)?;

        let free = memory
            .free_mb()
            .map(|mb| mb.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match offload {
            OffloadMode::Model => tracing::info!(
                "Free VRAM {} MB meets threshold {} MB -> using {}",
                free,
                self.threshold_mb,
                offload
            ),
            OffloadMode::Sequential => tracing::info!(
                "Free VRAM {} MB below threshold {} MB -> using {}",
                free,
                self.threshold_mb,
                offload
            ),
        }

        Ok(ModelHandle::new(pipeline, offload, memory))
    }
}
