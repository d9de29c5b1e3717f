//! # System Constants
//!
//! Defaults, progress checkpoints, lifecycle event names and failure pattern tags
//! shared across the scheduler.

/// Default values used when configuration does not override them
pub mod defaults {
    pub const MAX_CONCURRENT_PIPELINES: usize = 10;
    pub const BATCH_SIZE: usize = 5;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_DELAY_MS: u64 = 5_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const MAX_RETRY_DELAY_MS: u64 = 300_000;
    pub const EXECUTION_TIMEOUT_MS: u64 = 600_000;
    pub const STOP_TIMEOUT_MS: u64 = 5_000;
    pub const SWEEP_INTERVAL_MS: u64 = 60 * 60 * 1000;
    pub const PIPELINE_RETENTION_MS: u64 = 24 * 60 * 60 * 1000;
    pub const FAILURE_TEMPLATE_CAPACITY: usize = 1_000;
    pub const FAILURE_TEMPLATE_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;
    pub const COMMAND_BUFFER: usize = 256;
}

/// Progress checkpoints emitted by execution units, in percent
pub mod progress {
    pub const STARTED: u8 = 0;
    pub const COLLECTED: u8 = 25;
    pub const PROCESSED: u8 = 75;
    pub const COMPLETE: u8 = 100;

    /// Linear interpolation between [`COLLECTED`] and [`PROCESSED`]
    pub fn processing(processed: usize, total: usize) -> u8 {
        if total == 0 {
            return PROCESSED;
        }
        let span = u64::from(PROCESSED - COLLECTED);
        let done = processed.min(total) as u64;
        COLLECTED + (span * done / total as u64) as u8
    }
}

/// Lifecycle event names, used for log fields and telemetry labels
pub mod events {
    pub const PIPELINE_QUEUED: &str = "pipeline.queued";
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    pub const PIPELINE_PROGRESS: &str = "pipeline.progress";
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    pub const PIPELINE_RETRYING: &str = "pipeline.retrying";
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    pub const PIPELINE_STOPPED: &str = "pipeline.stopped";
    pub const FAILURE_TEMPLATE_CREATED: &str = "failure_template.created";
}

/// Failure pattern tags produced by the failure analyzer
pub mod patterns {
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const RATE_LIMIT_ERROR: &str = "RATE_LIMIT_ERROR";
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const HTTP_PREFIX: &str = "HTTP_";
}

#[cfg(test)]
mod tests {
    use super::progress;

    #[test]
    fn test_processing_progress_interpolation() {
        assert_eq!(progress::processing(0, 10), 25);
        assert_eq!(progress::processing(5, 10), 50);
        assert_eq!(progress::processing(10, 10), 75);
        assert_eq!(progress::processing(3, 7), 46);
    }

    #[test]
    fn test_processing_progress_edge_cases() {
        assert_eq!(progress::processing(0, 0), 75);
        assert_eq!(progress::processing(12, 10), 75);
    }
}
