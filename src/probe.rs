// Accelerator memory probe backed by nvidia-smi

use crate::{KontextError, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::process::Command;

/// Default device-query tool
pub const NVIDIA_SMI: &str = "nvidia-smi";

const QUERY_ARGS: [&str; 2] = [
    "--query-gpu=memory.used,memory.total",
    "--format=csv,nounits,noheader",
];

/// Accelerator memory in megabytes at the time of the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryReading {
    pub used_mb: u64,
    pub total_mb: u64,
    pub free_mb: u64,
}

impl MemoryReading {
    pub fn new(used_mb: u64, total_mb: u64) -> Self {
        Self {
            used_mb,
            total_mb,
            free_mb: total_mb.saturating_sub(used_mb),
        }
    }
}

/// Outcome of a probe: a reading, or the reason none could be taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryProbe {
    Reading(MemoryReading),
    Unavailable(String),
}

impl MemoryProbe {
    pub fn free_mb(&self) -> Option<u64> {
        match self {
            Self::Reading(reading) => Some(reading.free_mb),
            Self::Unavailable(_) => None,
        }
    }
}

/// Source of accelerator memory readings
pub trait DeviceProbe: Send + Sync {
    /// Take a reading. Never fails; problems come back as `Unavailable`.
    fn probe(&self) -> MemoryProbe;
}

/// Probe that shells out to `nvidia-smi`
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    program: String,
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new(NVIDIA_SMI)
    }
}

impl NvidiaSmiProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn query(&self) -> Result<MemoryReading> {
        let output = Command::new(&self.program)
            .args(QUERY_ARGS)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => KontextError::ProbeUnavailable(format!(
                    "{} not found (is an NVIDIA driver installed?)",
                    self.program
                )),
                _ => KontextError::ProbeUnavailable(format!(
                    "failed to run {}: {}",
                    self.program, e
                )),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KontextError::ProbeUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_memory_query(&String::from_utf8_lossy(&output.stdout))
    }
}

impl DeviceProbe for NvidiaSmiProbe {
    fn probe(&self) -> MemoryProbe {
        match self.query() {
            Ok(reading) => {
                tracing::debug!(
                    "GPU memory: used {} MB / total {} MB (free {} MB)",
                    reading.used_mb,
                    reading.total_mb,
                    reading.free_mb
                );
                MemoryProbe::Reading(reading)
            }
            Err(e) => {
                tracing::error!("{}", e);
                MemoryProbe::Unavailable(e.to_string())
            }
        }
    }
}

/// Probe returning a fixed result
#[derive(Debug, Clone)]
pub struct StaticProbe(pub MemoryProbe);

impl DeviceProbe for StaticProbe {
    fn probe(&self) -> MemoryProbe {
        self.0.clone()
    }
}

/// Parse `used, total` output from the memory query.
///
/// Only the first GPU line is read; it is the device the pipeline runs on.
pub fn parse_memory_query(output: &str) -> Result<MemoryReading> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| KontextError::ProbeUnavailable("empty memory query output".into()))?;

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [used, total] = fields.as_slice() else {
        return Err(KontextError::ProbeUnavailable(format!(
            "expected 'used, total' but got '{}'",
            line
        )));
    };

    let parse = |field: &str| {
        field.parse::<u64>().map_err(|e| {
            KontextError::ProbeUnavailable(format!("invalid memory value '{}': {}", field, e))
        })
    };

    Ok(MemoryReading::new(parse(*used)?, parse(*total)?))
}
