// Configuration loader
// Loads settings from ~/.neural-platform/config.toml, then applies environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, ENV_API_KEY, ENV_BASE_URL, ENV_MAX_RESIDENT,
};
use super::settings::Config;

/// `~/.neural-platform/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from `path` (or the default location) plus the process environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let config = load_config_from(&path)?;
    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Read a config file; a missing file yields defaults
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    parse_config(&contents).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).context("Failed to parse TOML")
}

/// Apply `NEURAL_PLATFORM_*` overrides read through `lookup`
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(base_url) = non_empty(ENV_BASE_URL) {
        config.backend.base_url = Some(base_url);
    }
    if let Some(api_key) = non_empty(ENV_API_KEY) {
        config.backend.api_key = Some(api_key);
    }
    if let Some(max_resident) = non_empty(ENV_MAX_RESIDENT) {
        let parsed = max_resident
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{} must be a number (got '{}')", ENV_MAX_RESIDENT, max_resident))?;
        config.sessions.max_resident = Some(parsed);
    }

    Ok(config)
}
