//! Configuration file support for the Kontext service

use crate::executor::{EditOptions, DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS};
use crate::pipeline::{ModelSource, KONTEXT_DEV_REPO};
use crate::provision::VRAM_THRESHOLD_MB;
use crate::resolution::DEFAULT_TARGET_PIXELS;
use crate::{KontextError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub edit: EditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body (uploads included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Seconds allowed for fetching a remote `image_url`
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// HuggingFace repo to load weights from
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Environment variable holding the Hub token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Free VRAM at or above which whole sub-modules stay resident
    #[serde(default = "default_vram_threshold_mb")]
    pub vram_threshold_mb: u64,

    #[serde(default)]
    pub use_cpu: bool,

    #[serde(default = "default_true")]
    pub verify_hub_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfig {
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,

    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: usize,

    #[serde(default = "default_target_pixels")]
    pub target_pixels: u64,
}

// Defaults

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_repo_id() -> String {
    KONTEXT_DEV_REPO.to_string()
}

fn default_token_env() -> String {
    "HF_TOKEN".to_string()
}

fn default_vram_threshold_mb() -> u64 {
    VRAM_THRESHOLD_MB
}

fn default_true() -> bool {
    true
}

fn default_guidance_scale() -> f64 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_inference_steps() -> usize {
    DEFAULT_INFERENCE_STEPS
}

fn default_target_pixels() -> u64 {
    DEFAULT_TARGET_PIXELS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo_id: default_repo_id(),
            token_env: default_token_env(),
            vram_threshold_mb: default_vram_threshold_mb(),
            use_cpu: false,
            verify_hub_access: true,
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            guidance_scale: default_guidance_scale(),
            num_inference_steps: default_inference_steps(),
            target_pixels: default_target_pixels(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.repo_id.trim().is_empty() {
            return Err(KontextError::Config("model.repo_id must not be empty".into()));
        }
        if self.server.fetch_timeout_secs == 0 {
            return Err(KontextError::Config("server.fetch_timeout_secs must be positive".into()));
        }
        if self.edit.target_pixels == 0 {
            return Err(KontextError::Config("edit.target_pixels must be positive".into()));
        }
        if self.edit.num_inference_steps == 0 {
            return Err(KontextError::Config("edit.num_inference_steps must be positive".into()));
        }
        if !self.edit.guidance_scale.is_finite() {
            return Err(KontextError::Config("edit.guidance_scale must be finite".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl ModelConfig {
    /// Model source with the token read from `token_env`
    pub fn source(&self) -> ModelSource {
        ModelSource::from_env(&self.repo_id, &self.token_env)
    }
}

impl EditConfig {
    /// Options for `prompt` with optional per-request overrides
    pub fn options(
        &self,
        prompt: impl Into<String>,
        guidance_scale: Option<f64>,
        num_inference_steps: Option<usize>,
        seed: Option<u64>,
    ) -> EditOptions {
        EditOptions {
            prompt: prompt.into(),
            guidance_scale: guidance_scale.unwrap_or(self.guidance_scale),
            num_inference_steps: num_inference_steps.unwrap_or(self.num_inference_steps),
            target_pixels: self.target_pixels,
            seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ServiceConfig::parse("").unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.model.repo_id, KONTEXT_DEV_REPO);
        assert_eq!(config.model.token_env, "HF_TOKEN");
        assert_eq!(config.model.vram_threshold_mb, 26624);
        assert!(config.model.verify_hub_access);
        assert_eq!(config.edit.num_inference_steps, 28);
        assert_eq!(config.server.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_sections() {
        let config = ServiceConfig::parse(
            r#"
            [server]
            port = 9000

            [model]
            vram_threshold_mb = 16384
            use_cpu = true

            [edit]
            guidance_scale = 3.5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.vram_threshold_mb, 16384);
        assert!(config.model.use_cpu);
        assert_eq!(config.edit.guidance_scale, 3.5);
        assert_eq!(config.edit.target_pixels, 1_048_576);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServiceConfig::parse("[edit]\ntarget_pixels = 0"),
            Err(KontextError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::parse("[edit]\nnum_inference_steps = 0"),
            Err(KontextError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::parse("[model]\nrepo_id = \"\""),
            Err(KontextError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::parse("[server]\nport = \"eighty\""),
            Err(KontextError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::parse("[server]\nfetch_timeout_secs = 0"),
            Err(KontextError::Config(_))
        ));
    }

    #[test]
    fn test_request_overrides() {
        let edit = EditConfig::default();
        let options = edit.options("add a hat", None, Some(8), Some(99));
        assert_eq!(options.guidance_scale, 2.5);
        assert_eq!(options.num_inference_steps, 8);
        assert_eq!(options.seed, Some(99));
        assert_eq!(options.prompt, "add a hat");
    }
}
