//! Configuration for the import controllers
//!
//! A single YAML file layered over built-in defaults, with a few environment
//! variable overrides for container deployments.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{AutoImportConfig, Config, ControllersConfig};

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "logLevel" => Ok(config.log_level.clone()),
        "apiTimeoutSeconds" => Ok(config.api_timeout_seconds.to_string()),
        "errorRequeueSeconds" => Ok(config.error_requeue_seconds.to_string()),
        "controllers.importStatus" => Ok(config.controllers.import_status.to_string()),
        "controllers.autoImport" => Ok(config.controllers.auto_import.to_string()),
        "controllers.namespaceDeletion" => Ok(config.controllers.namespace_deletion.to_string()),
        "autoImport.maxRetry" => Ok(config.auto_import.max_retry.to_string()),
        "autoImport.requeueSeconds" => Ok(config.auto_import.requeue_seconds.to_string()),
        "autoImport.probeTimeoutSeconds" => {
            Ok(config.auto_import.probe_timeout_seconds.to_string())
        }
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}
