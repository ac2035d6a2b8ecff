//! Application configuration.
//!
//! One `Config` covers all three binaries; each reads the sections it needs.
//! Loaded once at startup from YAML files and environment variables.

mod messaging;
mod server;

pub use ::config::ConfigError;
pub use messaging::MessagingConfig;
pub use server::{
    DownstreamConfig, GatewayConfig, ListenerConfig, LoggerConfig, SinkConfig, SinkType,
};

use serde::Deserialize;

use crate::storage::StorageConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SWITCHYARD_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "SWITCHYARD";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SWITCHYARD_LOG";
/// Legacy broker URL variable; overrides `messaging.url` when set.
pub const RABBIT_URL_ENV_VAR: &str = "RABBIT_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub messaging: MessagingConfig,
    pub gateway: GatewayConfig,
    pub listener: ListenerConfig,
    pub logger: LoggerConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `RABBIT_URL`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("messaging.url", std::env::var(RABBIT_URL_ENV_VAR).ok())?
            .build()?;

        config.try_deserialize()
    }
}
