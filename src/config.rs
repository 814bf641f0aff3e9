//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a user config file in the config directory; the result is
//! built once at startup and handed to the pipeline as a plain value. Nothing
//! downstream reads the environment or the file again.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [provider]
//! primary_endpoint = "https://clipdrop-api.co/image-upscaling/v1"
//! fallback_endpoint = "https://clipdrop-api.co/image-upscaling/v1/upscale"   # "" disables
//! api_key_env = "REAL_UPSCALE_API_KEY"   # env var holding the provider key
//! max_dimension = 4096                   # provider's largest accepted edge
//! request_timeout_secs = 120
//!
//! [pipeline]
//! latency_ms = 1200         # fixed pause before each upscale (0 disables)
//! supported_factors = [2, 4]
//! default_factor = 2
//! jpeg_quality = 90         # local resize JPEG quality (1-100)
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [history]
//! path = "upscale-history.jsonl"   # omit to disable the history log
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [pipeline]
//! latency_ms = 0
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Credential
//!
//! The provider key never lives in the file. `api_key_env` names the
//! environment variable to read; [`ProviderSettings::resolve`] does that
//! exactly once. Whether a key is present decides the pipeline's operating
//! strategy (see [`crate::pipeline`]).

use crate::imaging::MAX_PROVIDER_DIMENSION;
use crate::provider::{Credential, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Application configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleConfig {
    /// Remote enhancement provider.
    pub provider: ProviderSettings,
    /// Pipeline behaviour (latency, factors, local resize quality).
    pub pipeline: PipelineSettings,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Optional history log.
    pub history: HistoryConfig,
}

impl UpscaleConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("provider.primary_endpoint", &self.provider.primary_endpoint)?;
        if let Some(fallback) = self.provider.fallback() {
            validate_endpoint("provider.fallback_endpoint", fallback)?;
        }
        if self.provider.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "provider.max_dimension must be positive".into(),
            ));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "provider.request_timeout_secs must be positive".into(),
            ));
        }
        if self.pipeline.supported_factors.is_empty() {
            return Err(ConfigError::Validation(
                "pipeline.supported_factors must not be empty".into(),
            ));
        }
        if self.pipeline.supported_factors.contains(&0) {
            return Err(ConfigError::Validation(
                "pipeline.supported_factors values must be positive".into(),
            ));
        }
        if !self
            .pipeline
            .supported_factors
            .contains(&self.pipeline.default_factor)
        {
            return Err(ConfigError::Validation(format!(
                "pipeline.default_factor {} is not in supported_factors",
                self.pipeline.default_factor
            )));
        }
        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(ConfigError::Validation(
                "pipeline.jpeg_quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{key} must be an http(s) URL, got {url:?}"
        )))
    }
}

/// Enhancement provider settings as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub primary_endpoint: String,
    /// Tried once, only when the primary answers 404.
    pub fallback_endpoint: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_dimension: u32,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            primary_endpoint: "https://clipdrop-api.co/image-upscaling/v1".to_string(),
            fallback_endpoint: Some(
                "https://clipdrop-api.co/image-upscaling/v1/upscale".to_string(),
            ),
            api_key_env: "REAL_UPSCALE_API_KEY".to_string(),
            max_dimension: MAX_PROVIDER_DIMENSION,
            request_timeout_secs: 120,
        }
    }
}

impl ProviderSettings {
    /// Configured fallback endpoint; an empty string disables it.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback_endpoint.as_deref().filter(|url| !url.is_empty())
    }

    /// Build the runtime provider config, looking the key up via `lookup`.
    ///
    /// The binary passes `|name| std::env::var(name).ok()`; tests pass a
    /// closure so they never touch the process environment.
    pub fn resolve(&self, lookup: impl FnOnce(&str) -> Option<String>) -> ProviderConfig {
        ProviderConfig {
            credential: lookup(&self.api_key_env).and_then(Credential::new),
            primary_endpoint: self.primary_endpoint.clone(),
            fallback_endpoint: self.fallback().map(str::to_string),
            max_dimension: self.max_dimension,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Pipeline behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Fixed pause before each upscale, keeping perceived latency the same
    /// whether the provider or the local fallback does the work.
    pub latency_ms: u64,
    pub supported_factors: Vec<u32>,
    pub default_factor: u32,
    pub jpeg_quality: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            latency_ms: 1200,
            supported_factors: vec![2, 4],
            default_factor: 2,
            jpeg_quality: 90,
        }
    }
}

impl PipelineSettings {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel upscale workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// History log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// JSON-lines file to append to. Relative paths resolve against the
    /// config directory. `None` disables the log.
    pub path: Option<PathBuf>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(UpscaleConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<UpscaleConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UpscaleConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// validates the result and resolves a relative history path against `dir`.
pub fn load_config(dir: &Path) -> Result<UpscaleConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    let mut config = resolve_config(base, overlay)?;
    if let Some(path) = config.history.path.take() {
        config.history.path = Some(if path.is_relative() {
            dir.join(path)
        } else {
            path
        });
    }
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# magnify configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Enhancement provider
# ---------------------------------------------------------------------------
[provider]
# Endpoint receiving the multipart upscale request.
primary_endpoint = "https://clipdrop-api.co/image-upscaling/v1"

# Tried exactly once, and only when the primary endpoint answers 404.
# Set to "" to disable the fallback.
fallback_endpoint = "https://clipdrop-api.co/image-upscaling/v1/upscale"

# Environment variable holding the provider API key. When the variable is
# unset or empty, magnify runs in degraded mode: images are resized locally
# and a placeholder is used if that fails. When it is set, provider errors
# are reported instead of masked.
api_key_env = "REAL_UPSCALE_API_KEY"

# Largest edge (px) the provider accepts. Targets are capped to fit.
max_dimension = 4096

# Per-request timeout for provider calls, in seconds.
request_timeout_secs = 120

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# Fixed pause before every upscale so the provider and local paths feel
# alike to users. Set to 0 to disable.
latency_ms = 1200

# Factors callers may request, and the one used when none is given.
supported_factors = [2, 4]
default_factor = 2

# JPEG quality for locally resized images (1 = worst, 100 = best).
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel upscale workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# History
# ---------------------------------------------------------------------------
[history]
# Append one JSON line per successful upscale. Relative paths resolve
# against the config directory. Omit to disable.
# path = "upscale-history.jsonl"
"##
}
