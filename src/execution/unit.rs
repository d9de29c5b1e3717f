//! # Execution Unit
//!
//! Runs the collect-then-process stages for exactly one pipeline attempt.
//!
//! ## Overview
//!
//! Each unit runs as its own task on the dedicated unit runtime, wrapped by a
//! supervisor task that awaits the unit's `JoinHandle` from the coordinator's
//! runtime. The supervisor turns a panic or an exceeded execution timeout into
//! [`ExecutionError::ExecutionFault`] and always reports exactly one `Finished`
//! message to the coordinator. A unit that spins on the CPU only occupies a unit
//! worker thread; the scheduler loop and the supervisors keep running.
//!
//! Items are processed in fixed-size batches; items inside a batch run concurrently
//! and fail independently. The cancellation token is checked only at batch
//! boundaries.

use super::errors::{ExecutionError, StageError};
use super::outcome::{ExecutionOutcome, UnitMessage};
use super::traits::{Collector, Processor};
use crate::constants::progress;
use crate::models::{ItemFailure, PipelineId, PipelineResult, ProcessedItem};
use futures::future::join_all;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything one attempt needs; owns its inputs so it can move into a task
pub struct ExecutionUnit {
    pub pipeline_id: PipelineId,
    pub attempt: u32,
    pub source: String,
    pub source_id: String,
    pub options: Value,
    pub batch_size: usize,
    collector: Arc<dyn Collector>,
    processor: Arc<dyn Processor>,
    cancel: CancellationToken,
    messages: mpsc::UnboundedSender<UnitMessage>,
}

impl std::fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("pipeline_id", &self.pipeline_id)
            .field("attempt", &self.attempt)
            .field("source", &self.source)
            .field("source_id", &self.source_id)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ExecutionUnit {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        pipeline_id: PipelineId,
        attempt: u32,
        source: String,
        source_id: String,
        options: Value,
        batch_size: usize,
        collector: Arc<dyn Collector>,
        processor: Arc<dyn Processor>,
        cancel: CancellationToken,
        messages: mpsc::UnboundedSender<UnitMessage>,
    ) -> Self {
        Self {
            pipeline_id,
            attempt,
            source,
            source_id,
            options,
            batch_size: batch_size.max(1),
            collector,
            processor,
            cancel,
            messages,
        }
    }

    /// Run both stages and report how the attempt ended
    pub async fn execute(&self) -> ExecutionOutcome {
        let started = Instant::now();
        self.report_progress(progress::STARTED, 0, 0);

        if self.cancel.is_cancelled() {
            return ExecutionOutcome::Cancelled { partial: None };
        }

        let items = match self
            .collector
            .collect(&self.source, &self.source_id, &self.options)
            .await
        {
            Ok(items) => items,
            Err(error) => {
                debug!(
                    pipeline_id = %self.pipeline_id,
                    attempt = self.attempt,
                    error = %error,
                    "EXECUTION: collection failed"
                );
                return ExecutionOutcome::Failed {
                    error: ExecutionError::CollectionError {
                        platform: self.source.clone(),
                        error,
                    },
                    partial: None,
                };
            }
        };

        let total = items.len();
        let mut result = PipelineResult::with_total(total);
        let mut last_error: Option<StageError> = None;
        self.report_progress(progress::COLLECTED, 0, total);

        for batch in items.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                debug!(
                    pipeline_id = %self.pipeline_id,
                    processed = result.processed_count(),
                    total,
                    "EXECUTION: cancelled at batch boundary"
                );
                result.processing_time_ms = elapsed_ms(started);
                return ExecutionOutcome::Cancelled {
                    partial: Some(result),
                };
            }

            let outcomes = join_all(batch.iter().map(|item| async move {
                (item.id.clone(), self.processor.process(item).await)
            }))
            .await;

            for (item_id, outcome) in outcomes {
                match outcome {
                    Ok(output) => result.items.push(ProcessedItem { item_id, output }),
                    Err(error) => {
                        result.failed_items.push(ItemFailure {
                            item_id,
                            error: error.to_string(),
                        });
                        last_error = Some(error);
                    }
                }
            }

            let processed = result.processed_count();
            self.report_progress(progress::processing(processed, total), processed, total);
        }

        result.processing_time_ms = elapsed_ms(started);

        if total > 0 && result.items.is_empty() {
            let failed_items = result.failed_items.len();
            return ExecutionOutcome::Failed {
                error: ExecutionError::ProcessingError {
                    failed_items,
                    last_error: last_error
                        .unwrap_or_else(|| StageError::new("every item failed processing")),
                },
                partial: Some(result),
            };
        }

        self.report_progress(progress::COMPLETE, total, total);
        ExecutionOutcome::Completed(result)
    }

    fn report_progress(&self, percent: u8, processed_items: usize, total_items: usize) {
        // The coordinator may already be gone during shutdown
        let _ = self.messages.send(UnitMessage::Progress {
            pipeline_id: self.pipeline_id,
            attempt: self.attempt,
            percent,
            processed_items,
            total_items,
        });
    }
}

/// Coordinator-side handle to a spawned unit
#[derive(Debug)]
pub(crate) struct UnitHandle {
    pub attempt: u32,
    pub cancel: CancellationToken,
    /// Aborts the unit task itself; the supervisor then reports `Cancelled`
    pub abort: AbortHandle,
}

/// Spawn `unit` on `units` under a supervisor that reports exactly one `Finished` message.
///
/// The supervisor runs on the caller's runtime.
pub(crate) fn spawn_supervised(
    unit: ExecutionUnit,
    timeout: Option<Duration>,
    units: &Handle,
) -> UnitHandle {
    let pipeline_id = unit.pipeline_id;
    let attempt = unit.attempt;
    let cancel = unit.cancel.clone();
    let messages = unit.messages.clone();

    let mut task = units.spawn(async move { unit.execute().await });
    let abort = task.abort_handle();

    tokio::spawn(async move {
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => outcome_from_join(joined),
                Err(_) => {
                    task.abort();
                    warn!(
                        pipeline_id = %pipeline_id,
                        attempt,
                        timeout_ms = limit.as_millis() as u64,
                        "EXECUTION: unit exceeded execution timeout"
                    );
                    ExecutionOutcome::Failed {
                        error: ExecutionError::fault(format!(
                            "timed out after {}ms",
                            limit.as_millis()
                        )),
                        partial: None,
                    }
                }
            },
            None => outcome_from_join(task.await),
        };

        let _ = messages.send(UnitMessage::Finished {
            pipeline_id,
            attempt,
            outcome,
        });
    });

    UnitHandle {
        attempt,
        cancel,
        abort,
    }
}

fn outcome_from_join(joined: Result<ExecutionOutcome, JoinError>) -> ExecutionOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(error) if error.is_panic() => {
            let reason = panic_message(error.into_panic());
            warn!(reason = %reason, "EXECUTION: unit panicked");
            ExecutionOutcome::Failed {
                error: ExecutionError::fault(format!("unit panicked: {reason}")),
                partial: None,
            }
        }
        Err(_) => ExecutionOutcome::Cancelled { partial: None },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
