// Project-wide constants
//
// Centralised here so defaults and environment variable names have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Config file location relative to the home directory
pub const CONFIG_DIR_NAME: &str = ".neural-platform";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default text sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default maximum tokens per text completion.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Default diffusion steps per image.
pub const DEFAULT_INFERENCE_STEPS: u32 = 20;

/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

/// Default HTTP request timeout for the backend (model loads can be slow).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const ENV_BASE_URL: &str = "NEURAL_PLATFORM_BASE_URL";
pub const ENV_API_KEY: &str = "NEURAL_PLATFORM_API_KEY";
pub const ENV_MAX_RESIDENT: &str = "NEURAL_PLATFORM_MAX_RESIDENT";
