// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::engine::{ImageGenerationParams, TextGenerationParams};

/// Fixed parameters applied to every generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPolicy {
    pub text: TextGenerationParams,
    pub image: ImageGenerationParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum ready engines per modality (unset = keep everything loaded)
    pub max_resident: Option<usize>,
}

/// OpenAI-compatible backend for text models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// e.g. "http://localhost:8080" - unset means offline demo engines
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationPolicy,
    pub sessions: SessionConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let text = &self.generation.text;
        if !text.temperature.is_finite() || !(0.0..=2.0).contains(&text.temperature) {
            bail!(
                "generation.text.temperature must be between 0.0 and 2.0 (got {})",
                text.temperature
            );
        }
        if text.max_tokens == 0 {
            bail!("generation.text.max_tokens must be at least 1");
        }

        let image = &self.generation.image;
        if image.num_inference_steps == 0 {
            bail!("generation.image.num_inference_steps must be at least 1");
        }
        if !image.guidance_scale.is_finite() || image.guidance_scale < 0.0 {
            bail!(
                "generation.image.guidance_scale must be non-negative (got {})",
                image.guidance_scale
            );
        }

        if self.sessions.max_resident == Some(0) {
            bail!("sessions.max_resident must be at least 1 (omit it for no limit)");
        }

        if let Some(url) = &self.backend.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("backend.base_url must start with http:// or https:// (got '{}')", url);
            }
        }
        if self.backend.request_timeout_secs == 0 {
            bail!("backend.request_timeout_secs must be at least 1");
        }

        Ok(())
    }
}
