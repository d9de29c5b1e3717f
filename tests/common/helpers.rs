//! Scheduler construction and polling helpers.

use feedpulse_core::config::SchedulerConfig;
use feedpulse_core::models::{Pipeline, PipelineId};
use feedpulse_core::state_machine::PipelineStatus;
use feedpulse_core::PipelineScheduler;
use std::time::Duration;

/// Upper bound for any single wait in the integration tests
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Defaults with millisecond delays so retry paths finish quickly
pub fn fast_config(max_concurrent_pipelines: usize) -> SchedulerConfig {
    let mut config = SchedulerConfig {
        max_concurrent_pipelines,
        ..SchedulerConfig::default()
    };
    config.retry.retry_delay_ms = 10;
    config.execution.stop_timeout_ms = 200;
    config.execution.timeout_ms = 5_000;
    config
}

/// Poll until `condition` holds, panicking after [`WAIT_TIMEOUT`]
pub async fn wait_until<F>(description: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let result = tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {description}");
}

pub async fn wait_for_status(
    scheduler: &PipelineScheduler,
    pipeline_id: PipelineId,
    status: PipelineStatus,
) -> Pipeline {
    wait_until(&format!("{pipeline_id} to reach {status}"), || {
        scheduler
            .get_status(pipeline_id)
            .is_ok_and(|p| p.status == status)
    })
    .await;
    scheduler.get_status(pipeline_id).unwrap()
}

pub fn count_with_status(scheduler: &PipelineScheduler, status: PipelineStatus) -> usize {
    scheduler.list_by_status(status).len()
}
