//! # Retry & Back-off Controller
//!
//! Decides between another attempt and permanent failure, and realizes the retry
//! delay with a timer task so the coordinator never sleeps on the admission path.

use crate::config::{BackoffStrategy, RetryConfig};
use crate::models::PipelineId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Move to `retrying` and requeue after `delay`
    Retry { delay: Duration },
    /// Retry budget exhausted; fail permanently
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Decide based on the retry count before this failure
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count < self.config.max_retries {
            RetryDecision::Retry {
                delay: self.delay_for(retry_count + 1),
            }
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Delay before the `retry_number`-th retry (1-based)
    pub fn delay_for(&self, retry_number: u32) -> Duration {
        let base = self.config.retry_delay();
        match self.config.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => {
                let exponent = retry_number.saturating_sub(1).min(i32::MAX as u32) as i32;
                let factor = self.config.backoff_multiplier.powi(exponent);
                let millis = (base.as_millis() as f64 * factor)
                    .min(self.config.max_retry_delay_ms as f64);
                Duration::from_millis(millis.max(0.0) as u64)
            }
        }
    }

    /// Send `pipeline_id` back to the coordinator once `delay` has elapsed
    pub(crate) fn schedule_requeue(
        &self,
        pipeline_id: PipelineId,
        delay: Duration,
        requeue_tx: mpsc::UnboundedSender<PipelineId>,
    ) -> AbortHandle {
        debug!(
            pipeline_id = %pipeline_id,
            delay_ms = delay.as_millis() as u64,
            "RETRY: requeue scheduled"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = requeue_tx.send(pipeline_id);
        })
        .abort_handle()
    }
}
