//! Configuration schema definitions
//!
//! Defines the structure of the controller configuration file using serde.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Default log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bound applied to every hub API call
    #[serde(default = "default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,

    /// Which controllers run
    #[serde(default)]
    pub controllers: ControllersConfig,

    /// Auto-import retry settings
    #[serde(default)]
    pub auto_import: AutoImportConfig,

    /// Requeue delay after a reconcile returned an error
    #[serde(default = "default_error_requeue_seconds")]
    pub error_requeue_seconds: u64,
}

/// Controller enablement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllersConfig {
    #[serde(default = "default_true")]
    pub import_status: bool,

    #[serde(default = "default_true")]
    pub auto_import: bool,

    #[serde(default = "default_true")]
    pub namespace_deletion: bool,
}

/// Auto-import configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoImportConfig {
    /// Attempts allowed before the secret is deleted
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Requeue delay after a failed attempt
    #[serde(default = "default_requeue_seconds")]
    pub requeue_seconds: u64,

    /// Bound on contacting the managed cluster
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_timeout_seconds() -> u64 {
    30
}

fn default_error_requeue_seconds() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_retry() -> u32 {
    5
}

fn default_requeue_seconds() -> u64 {
    10
}

fn default_probe_timeout_seconds() -> u64 {
    10
}

impl Config {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }
}

impl AutoImportConfig {
    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_timeout_seconds: default_api_timeout_seconds(),
            controllers: ControllersConfig::default(),
            auto_import: AutoImportConfig::default(),
            error_requeue_seconds: default_error_requeue_seconds(),
        }
    }
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            import_status: default_true(),
            auto_import: default_true(),
            namespace_deletion: default_true(),
        }
    }
}

impl Default for AutoImportConfig {
    fn default() -> Self {
        Self {
            max_retry: default_max_retry(),
            requeue_seconds: default_requeue_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}
