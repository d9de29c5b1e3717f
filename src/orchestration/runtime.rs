//! # Scheduler Runtimes
//!
//! The coordinator and the execution units never share worker threads.
//!
//! The coordinator runs on a single-threaded runtime driven by its own OS thread.
//! Execution units run on a multi-threaded runtime with one worker per concurrency
//! slot, so a unit that never yields (CPU-bound processor) holds one unit worker and
//! nothing else. Supervisors, retry timers and stop deadlines are spawned from the
//! coordinator and therefore live on its runtime.
//!
//! Both runtimes are shut down in the background when dropped, which keeps dropping
//! legal from inside another runtime's async context.

use super::coordinator::Coordinator;
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, info};

pub(crate) const COORDINATOR_THREAD_NAME: &str = "feedpulse-scheduler";
pub(crate) const UNIT_THREAD_NAME: &str = "feedpulse-unit";

pub(crate) struct SchedulerRuntimes {
    coordinator: Option<Runtime>,
    units: Option<Runtime>,
}

impl SchedulerRuntimes {
    pub(crate) fn build(config: &SchedulerConfig) -> Result<Self> {
        let coordinator = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| runtime_error("coordinator", &e))?;

        let units = Builder::new_multi_thread()
            .enable_all()
            .worker_threads(config.max_concurrent_pipelines.max(1))
            .thread_name(UNIT_THREAD_NAME)
            .build()
            .map_err(|e| runtime_error("execution unit", &e))?;

        debug!(
            unit_workers = config.max_concurrent_pipelines,
            "SCHEDULER: runtimes created"
        );

        Ok(Self {
            coordinator: Some(coordinator),
            units: Some(units),
        })
    }

    /// Handle used by the coordinator to spawn execution units
    pub(crate) fn units_handle(&self) -> Option<Handle> {
        self.units.as_ref().map(|units| units.handle().clone())
    }

    /// Drive `coordinator` to completion on a dedicated OS thread.
    ///
    /// `done` fires after the coordinator loop has exited and both runtimes are torn down.
    pub(crate) fn run_coordinator(
        self,
        coordinator: Coordinator,
        done: oneshot::Sender<()>,
    ) -> Result<()> {
        std::thread::Builder::new()
            .name(COORDINATOR_THREAD_NAME.to_string())
            .spawn(move || {
                if let Some(runtime) = self.coordinator.as_ref() {
                    runtime.block_on(coordinator.run());
                }
                drop(self);
                info!("SCHEDULER: runtimes shut down");
                let _ = done.send(());
            })
            .map(|_| ())
            .map_err(|e| runtime_error("coordinator thread", &e))
    }
}

impl Drop for SchedulerRuntimes {
    fn drop(&mut self) {
        // Units that never yield keep their thread until they return; do not wait for them
        if let Some(units) = self.units.take() {
            units.shutdown_background();
        }
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.shutdown_background();
        }
    }
}

fn runtime_error(what: &str, error: &std::io::Error) -> SchedulerError {
    SchedulerError::Internal(format!("failed to start {what} runtime: {error}"))
}
