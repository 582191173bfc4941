//! Configuration loading and merging logic
//!
//! Precedence order (highest to lowest):
//! 1. Environment variable overrides
//! 2. Config file (`--config`, else the root config path)
//! 3. Built-in defaults

use super::{defaults, paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

/// Log level override
pub const LOG_LEVEL_ENV: &str = "CLUSTER_IMPORT_LOG_LEVEL";
/// Default auto-import retry budget override
pub const MAX_RETRY_ENV: &str = "CLUSTER_IMPORT_MAX_RETRY";
/// Hub API timeout override
pub const API_TIMEOUT_ENV: &str = "CLUSTER_IMPORT_API_TIMEOUT_SECONDS";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged and validated
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = paths::resolve_config_path(explicit);

        let config = if explicit.is_some() || path.exists() {
            Self::load_file(&path)?
        } else {
            Self::load_defaults()
        };

        let config = Self::apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty file means "all defaults"
        if contents.trim().is_empty() {
            return Ok(Self::load_defaults());
        }

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that parse but cannot work
    pub fn validate(config: &Config) -> Result<()> {
        if config.auto_import.max_retry < 1 {
            return Err(anyhow::anyhow!("autoImport.maxRetry must be at least 1"));
        }
        for (key, value) in [
            ("apiTimeoutSeconds", config.api_timeout_seconds),
            ("errorRequeueSeconds", config.error_requeue_seconds),
            ("autoImport.requeueSeconds", config.auto_import.requeue_seconds),
            (
                "autoImport.probeTimeoutSeconds",
                config.auto_import.probe_timeout_seconds,
            ),
        ] {
            if value == 0 {
                return Err(anyhow::anyhow!("{} must be greater than 0", key));
            }
        }
        tracing_subscriber::EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("logLevel '{}' is not a valid filter", config.log_level))?;
        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Result<Config> {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.log_level = level;
        }

        if let Ok(max_retry) = std::env::var(MAX_RETRY_ENV) {
            config.auto_import.max_retry = max_retry
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number", MAX_RETRY_ENV))?;
        }

        if let Ok(timeout) = std::env::var(API_TIMEOUT_ENV) {
            config.api_timeout_seconds = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number", API_TIMEOUT_ENV))?;
        }

        Ok(config)
    }
}
