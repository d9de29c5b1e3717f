//! # Scheduler Configuration
//!
//! Configuration is injected into [`PipelineScheduler`](crate::PipelineScheduler)
//! at construction time; nothing reads global state after startup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use feedpulse_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then scheduler.toml (if present), then FEEDPULSE__* variables
//! let config = ConfigManager::load(Some(std::path::Path::new("scheduler.toml")))?;
//! assert!(config.max_concurrent_pipelines > 0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root scheduler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hard cap on simultaneously running pipelines; fixed for the scheduler's lifetime
    pub max_concurrent_pipelines: usize,

    /// Items processed concurrently per batch
    pub batch_size: usize,

    /// Retry and back-off policy
    pub retry: RetryConfig,

    /// Execution unit limits
    pub execution: ExecutionConfig,

    /// Retention of terminal pipelines and failure templates
    pub retention: RetentionConfig,

    /// Event bus settings
    pub events: EventConfig,

    /// Capacity of the coordinator's command channel
    pub command_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pipelines: defaults::MAX_CONCURRENT_PIPELINES,
            batch_size: defaults::BATCH_SIZE,
            retry: RetryConfig::default(),
            execution: ExecutionConfig::default(),
            retention: RetentionConfig::default(),
            events: EventConfig::default(),
            command_buffer: defaults::COMMAND_BUFFER,
        }
    }
}

impl SchedulerConfig {
    /// Validate the configuration, surfacing values that would stall the scheduler
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent_pipelines == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_concurrent_pipelines",
                self.max_concurrent_pipelines,
                "must be at least 1, otherwise no pipeline would ever run",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if self.command_buffer == 0 {
            return Err(ConfigurationError::invalid_value(
                "command_buffer",
                self.command_buffer,
                "must be at least 1",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                self.events.channel_capacity,
                "must be at least 1",
            ));
        }
        if self.retry.strategy == BackoffStrategy::Exponential && self.retry.backoff_multiplier < 1.0
        {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier,
                "must be >= 1.0 for exponential back-off",
            ));
        }
        Ok(())
    }
}

/// How the delay between attempts evolves with the retry count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// `retry_delay * multiplier^(retry_count - 1)`, capped at `max_retry_delay_ms`
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub strategy: BackoffStrategy,
    pub backoff_multiplier: f64,
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            strategy: BackoffStrategy::Fixed,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
            max_retry_delay_ms: defaults::MAX_RETRY_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-attempt wall clock limit; 0 disables it
    pub timeout_ms: u64,
    /// How long a stop request waits for a batch boundary before aborting the unit
    pub stop_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::EXECUTION_TIMEOUT_MS,
            stop_timeout_ms: defaults::STOP_TIMEOUT_MS,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub sweep_interval_ms: u64,
    /// Terminal pipelines older than this are removed by the sweep
    pub pipeline_retention_ms: u64,
    pub failure_template_capacity: usize,
    pub failure_template_max_age_ms: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: defaults::SWEEP_INTERVAL_MS,
            pipeline_retention_ms: defaults::PIPELINE_RETENTION_MS,
            failure_template_capacity: defaults::FAILURE_TEMPLATE_CAPACITY,
            failure_template_max_age_ms: defaults::FAILURE_TEMPLATE_MAX_AGE_MS,
        }
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn pipeline_retention(&self) -> Duration {
        Duration::from_millis(self.pipeline_retention_ms)
    }

    pub fn failure_template_max_age(&self) -> Duration {
        Duration::from_millis(self.failure_template_max_age_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}
