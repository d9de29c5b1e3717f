//! Configuration Loader
//!
//! Layers built-in defaults, an optional configuration file and environment
//! variables, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::SchedulerConfig;
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

/// Default environment variable prefix, e.g. `FEEDPULSE__MAX_CONCURRENT_PIPELINES`
pub const ENV_PREFIX: &str = "FEEDPULSE";

/// Separator between prefix and nested keys, e.g. `FEEDPULSE__RETRY__MAX_RETRIES`
pub const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with the default `FEEDPULSE` environment prefix
    pub fn load(path: Option<&Path>) -> ConfigResult<SchedulerConfig> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration reading overrides from `{prefix}__*` variables.
    ///
    /// A `path` that is given must exist; its format is inferred from the extension.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> ConfigResult<SchedulerConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&SchedulerConfig::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "CONFIG: loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: SchedulerConfig = builder
            .build()?
            .try_deserialize()
            .map_err(ConfigurationError::from)?;

        config.validate()?;

        debug!(
            max_concurrent_pipelines = config.max_concurrent_pipelines,
            batch_size = config.batch_size,
            max_retries = config.retry.max_retries,
            retry_delay_ms = config.retry.retry_delay_ms,
            "CONFIG: configuration loaded"
        );

        Ok(config)
    }
}
