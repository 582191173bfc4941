//! Default configuration values
//!
//! Provides the default configuration instance.

use super::schema::Config;

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}
