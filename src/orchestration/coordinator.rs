//! # Pipeline Coordinator
//!
//! The scheduler loop: a single task that serializes every queue and registry mutation.
//!
//! ## Overview
//!
//! The coordinator owns the [`PipelineQueue`], the table of running execution units
//! and the retry timers. It reacts to four inputs:
//!
//! - **Commands** from [`PipelineScheduler`](super::PipelineScheduler) handles
//!   (submit, stop, sweep, shutdown), each answered over a `oneshot` reply
//! - **Unit messages** (progress and the single `Finished` message per attempt)
//! - **Requeue signals** from retry timers once a retry delay has elapsed
//! - **Stop deadlines** for units that did not reach a batch boundary in time
//!
//! Execution units run in parallel on the unit runtime; the coordinator never awaits
//! them and never shares a worker thread with them. Admission (`try_admit`) runs after every enqueue, completion and stop.
//!
//! ```text
//! submit ──▶ Registry(queued) ──▶ Queue ──▶ try_admit ──▶ ExecutionUnit
//!                                   ▲                         │
//!                                   │ retry timer             │ Finished
//!                                   └──── Retry controller ◀──┘
//! ```

use super::failure_analyzer::{FailurePatternAnalyzer, FailureTemplateStore};
use super::metrics::MetricsAggregator;
use super::queue::PipelineQueue;
use super::retry::{RetryController, RetryDecision};
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::events::{EventBus, LifecycleEvent};
use crate::execution::{
    spawn_supervised, ExecutionError, ExecutionOutcome, ExecutionUnit, Processor, StageError,
    UnitHandle, UnitMessage,
};
use crate::logging::log_pipeline_operation;
use crate::models::{Pipeline, PipelineId, PipelineRequest, PipelineResult};
use crate::registry::{CollectorRegistry, PipelineRegistry};
use crate::state_machine::{PipelineEvent, PipelineStatus};
use crate::telemetry;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Result of one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pipelines_removed: usize,
    pub templates_pruned: usize,
}

/// Requests sent from scheduler handles to the coordinator task
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        request: PipelineRequest,
        reply: oneshot::Sender<Result<PipelineId>>,
    },
    SubmitBatch {
        requests: Vec<PipelineRequest>,
        reply: oneshot::Sender<Vec<Result<PipelineId>>>,
    },
    Stop {
        pipeline_id: PipelineId,
        reply: oneshot::Sender<Result<Pipeline>>,
    },
    Sweep {
        reply: oneshot::Sender<SweepReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Stop requested while the unit was running; resolved by `Finished` or the deadline
#[derive(Debug)]
struct PendingStop {
    waiters: Vec<oneshot::Sender<Result<Pipeline>>>,
    deadline: AbortHandle,
}

#[derive(Debug)]
struct RunningUnit {
    handle: UnitHandle,
    source: String,
    stop: Option<PendingStop>,
}

/// Shared state the coordinator writes and scheduler handles read
#[derive(Clone)]
pub(crate) struct CoordinatorContext {
    pub config: SchedulerConfig,
    pub registry: PipelineRegistry,
    pub collectors: CollectorRegistry,
    pub processor: Arc<dyn Processor>,
    pub event_bus: EventBus,
    pub metrics: MetricsAggregator,
    pub failure_templates: Arc<RwLock<FailureTemplateStore>>,
}

pub(crate) struct Coordinator {
    ctx: CoordinatorContext,
    analyzer: FailurePatternAnalyzer,
    retry: RetryController,
    queue: PipelineQueue,
    running: HashMap<PipelineId, RunningUnit>,
    retry_timers: HashMap<PipelineId, AbortHandle>,
    units: Handle,
    commands: mpsc::Receiver<Command>,
    unit_tx: mpsc::UnboundedSender<UnitMessage>,
    unit_rx: mpsc::UnboundedReceiver<UnitMessage>,
    requeue_tx: mpsc::UnboundedSender<PipelineId>,
    requeue_rx: mpsc::UnboundedReceiver<PipelineId>,
    stop_deadline_tx: mpsc::UnboundedSender<(PipelineId, u32)>,
    stop_deadline_rx: mpsc::UnboundedReceiver<(PipelineId, u32)>,
}

impl Coordinator {
    pub(crate) fn new(
        ctx: CoordinatorContext,
        commands: mpsc::Receiver<Command>,
        units: Handle,
    ) -> Self {
        let (unit_tx, unit_rx) = mpsc::unbounded_channel();
        let (requeue_tx, requeue_rx) = mpsc::unbounded_channel();
        let (stop_deadline_tx, stop_deadline_rx) = mpsc::unbounded_channel();
        let retry = RetryController::new(ctx.config.retry.clone());

        Self {
            ctx,
            analyzer: FailurePatternAnalyzer::new(),
            retry,
            queue: PipelineQueue::new(),
            running: HashMap::new(),
            retry_timers: HashMap::new(),
            units,
            commands,
            unit_tx,
            unit_rx,
            requeue_tx,
            requeue_rx,
            stop_deadline_tx,
            stop_deadline_rx,
        }
    }

    /// Run until a shutdown command arrives or every scheduler handle is dropped
    pub(crate) async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.ctx.config.retention.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        sweep.tick().await;

        info!(
            max_concurrent_pipelines = self.ctx.config.max_concurrent_pipelines,
            batch_size = self.ctx.config.batch_size,
            max_retries = self.ctx.config.retry.max_retries,
            "SCHEDULER: coordinator started"
        );

        loop {
            tokio::select! {
                biased;

                Some(message) = self.unit_rx.recv() => {
                    self.handle_unit_message(message);
                }

                Some(pipeline_id) = self.requeue_rx.recv() => {
                    self.handle_requeue(pipeline_id);
                }

                Some((pipeline_id, attempt)) = self.stop_deadline_rx.recv() => {
                    self.handle_stop_deadline(pipeline_id, attempt);
                }

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("SCHEDULER: all scheduler handles dropped");
                        self.shutdown();
                        break;
                    }
                },

                _ = sweep.tick() => {
                    self.sweep();
                }
            }
        }

        info!("SCHEDULER: coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { request, reply } => {
                let result = self.submit(request);
                self.try_admit();
                let _ = reply.send(result);
            }
            Command::SubmitBatch { requests, reply } => {
                let results = requests
                    .into_iter()
                    .map(|request| self.submit(request))
                    .collect();
                self.try_admit();
                let _ = reply.send(results);
            }
            Command::Stop { pipeline_id, reply } => self.handle_stop(pipeline_id, reply),
            Command::Sweep { reply } => {
                let _ = reply.send(self.sweep());
            }
            // Handled by the run loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    #[instrument(skip(self, request), fields(source = %request.source, source_id = %request.source_id))]
    fn submit(&mut self, request: PipelineRequest) -> Result<PipelineId> {
        request.validate()?;
        if !self.ctx.collectors.contains(&request.source) {
            return Err(SchedulerError::UnsupportedSource(request.source));
        }

        let pipeline = self.ctx.registry.create(request)?;
        self.enqueue(&pipeline);
        telemetry::record_submitted(&pipeline.source);

        debug!(
            pipeline_id = %pipeline.id,
            priority = %pipeline.priority,
            queued = self.queue.len(),
            "SCHEDULER: pipeline queued"
        );
        Ok(pipeline.id)
    }

    /// Push onto the queue; a pipeline that is already queued is left where it is
    fn enqueue(&mut self, pipeline: &Pipeline) -> bool {
        let pushed = self
            .queue
            .push(pipeline.id, pipeline.priority, pipeline.sequence);
        if !pushed {
            error!(
                pipeline_id = %pipeline.id,
                status = %pipeline.status,
                "SCHEDULER: pipeline is already queued, duplicate enqueue rejected"
            );
        }
        pushed
    }

    /// Admit queued pipelines while capacity allows
    fn try_admit(&mut self) {
        while self.running.len() < self.ctx.config.max_concurrent_pipelines {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            self.start(entry.pipeline_id);
        }
    }

    fn start(&mut self, pipeline_id: PipelineId) {
        let pipeline = match self.ctx.registry.transition(pipeline_id, PipelineEvent::Start) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to admit pipeline");
                return;
            }
        };

        let Some(collector) = self.ctx.collectors.get(&pipeline.source) else {
            // Collector was removed after submission
            let error = ExecutionError::CollectionError {
                platform: pipeline.source.clone(),
                error: StageError::new(format!(
                    "no collector registered for source {}",
                    pipeline.source
                )),
            };
            self.handle_failure(pipeline_id, error, None);
            return;
        };

        let cancel = CancellationToken::new();
        let unit = ExecutionUnit::new(
            pipeline.id,
            pipeline.attempts,
            pipeline.source.clone(),
            pipeline.source_id.clone(),
            pipeline.options.clone(),
            self.ctx.config.batch_size,
            collector,
            Arc::clone(&self.ctx.processor),
            cancel,
            self.unit_tx.clone(),
        );
        let handle = spawn_supervised(unit, self.ctx.config.execution.timeout(), &self.units);

        info!(
            pipeline_id = %pipeline.id,
            source = %pipeline.source,
            attempt = pipeline.attempts,
            running = self.running.len() + 1,
            "SCHEDULER: pipeline admitted"
        );

        self.running.insert(
            pipeline.id,
            RunningUnit {
                handle,
                source: pipeline.source,
                stop: None,
            },
        );
    }

    fn is_current_attempt(&self, pipeline_id: PipelineId, attempt: u32) -> bool {
        self.running
            .get(&pipeline_id)
            .is_some_and(|unit| unit.handle.attempt == attempt)
    }

    fn handle_unit_message(&mut self, message: UnitMessage) {
        match message {
            UnitMessage::Progress {
                pipeline_id,
                attempt,
                percent,
                processed_items,
                total_items,
            } => {
                if self.is_current_attempt(pipeline_id, attempt) {
                    self.ctx.registry.record_progress(
                        pipeline_id,
                        percent,
                        processed_items,
                        total_items,
                    );
                }
            }
            UnitMessage::Finished {
                pipeline_id,
                attempt,
                outcome,
            } => {
                if !self.is_current_attempt(pipeline_id, attempt) {
                    debug!(
                        pipeline_id = %pipeline_id,
                        attempt,
                        "SCHEDULER: ignoring result of a finalized attempt"
                    );
                    return;
                }
                if let Some(unit) = self.running.remove(&pipeline_id) {
                    self.finish(pipeline_id, unit, outcome);
                }
                self.try_admit();
            }
        }
    }

    fn finish(&mut self, pipeline_id: PipelineId, unit: RunningUnit, outcome: ExecutionOutcome) {
        // A pending stop wins over whatever the unit produced
        if let Some(pending) = unit.stop {
            pending.deadline.abort();
            self.finalize_stop(pipeline_id, &unit.source, outcome.into_result(), pending.waiters);
            return;
        }

        match outcome {
            ExecutionOutcome::Completed(result) => {
                let processing_time_ms = result.processing_time_ms;
                match self
                    .ctx
                    .registry
                    .transition(pipeline_id, PipelineEvent::Complete(result))
                {
                    Ok(pipeline) => {
                        self.ctx.metrics.record_completion(processing_time_ms);
                        telemetry::record_completed(&unit.source, processing_time_ms);
                        info!(
                            pipeline_id = %pipeline_id,
                            processing_time_ms,
                            processed_items = pipeline.processed_items,
                            "SCHEDULER: pipeline completed"
                        );
                        log_pipeline_operation(
                            "complete",
                            Some(&pipeline_id.to_string()),
                            Some(&pipeline.source),
                            pipeline.status.as_str(),
                            None,
                        );
                    }
                    Err(e) => {
                        error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to complete pipeline");
                    }
                }
            }
            ExecutionOutcome::Failed { error, partial } => {
                self.handle_failure(pipeline_id, error, partial);
            }
            ExecutionOutcome::Cancelled { partial } => {
                self.finalize_stop(pipeline_id, &unit.source, partial, Vec::new());
            }
        }
    }

    /// Retry or permanently fail an attempt that ended with `error`
    fn handle_failure(
        &mut self,
        pipeline_id: PipelineId,
        error: ExecutionError,
        partial: Option<PipelineResult>,
    ) {
        let pipeline = match self.ctx.registry.get(pipeline_id) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed pipeline vanished");
                return;
            }
        };

        match self.retry.decide(pipeline.retry_count) {
            RetryDecision::Retry { delay } => {
                let event = PipelineEvent::Retry {
                    error: error.to_string(),
                    partial,
                };
                match self.ctx.registry.transition(pipeline_id, event) {
                    Ok(retrying) => {
                        warn!(
                            pipeline_id = %pipeline_id,
                            error_type = error.error_type(),
                            error = %error,
                            retry_count = retrying.retry_count,
                            max_retries = self.retry.max_retries(),
                            delay_ms = delay.as_millis() as u64,
                            "SCHEDULER: attempt failed, retry scheduled"
                        );
                        telemetry::record_retried(&retrying.source);
                        let timer =
                            self.retry
                                .schedule_requeue(pipeline_id, delay, self.requeue_tx.clone());
                        if let Some(previous) = self.retry_timers.insert(pipeline_id, timer) {
                            previous.abort();
                        }
                    }
                    Err(e) => {
                        error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to schedule retry");
                    }
                }
            }
            RetryDecision::GiveUp => {
                let event = PipelineEvent::Fail {
                    error: error.to_string(),
                    partial,
                };
                match self.ctx.registry.transition(pipeline_id, event) {
                    Ok(failed) => self.record_permanent_failure(&failed, &error),
                    Err(e) => {
                        error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to fail pipeline");
                    }
                }
            }
        }
    }

    fn record_permanent_failure(&mut self, pipeline: &Pipeline, error: &ExecutionError) {
        let template = self.analyzer.analyze(pipeline, error);

        error!(
            pipeline_id = %pipeline.id,
            source = %pipeline.source,
            attempts = pipeline.attempts,
            patterns = ?template.patterns,
            error = %error,
            "SCHEDULER: pipeline failed permanently"
        );
        log_pipeline_operation(
            "fail",
            Some(&pipeline.id.to_string()),
            Some(&pipeline.source),
            pipeline.status.as_str(),
            Some(&template.patterns.join(",")),
        );

        self.ctx.metrics.record_failure();
        telemetry::record_failed(
            &pipeline.source,
            template.patterns.first().map(String::as_str),
        );

        self.ctx.failure_templates.write().push(template.clone());
        self.ctx
            .event_bus
            .publish(LifecycleEvent::FailureTemplateCreated {
                template: Box::new(template),
            });
    }

    fn handle_requeue(&mut self, pipeline_id: PipelineId) {
        self.retry_timers.remove(&pipeline_id);

        // Stopped or swept while waiting
        if self.ctx.registry.status(pipeline_id) != Some(PipelineStatus::Retrying) {
            return;
        }

        match self
            .ctx
            .registry
            .transition(pipeline_id, PipelineEvent::Requeue)
        {
            Ok(pipeline) => {
                self.enqueue(&pipeline);
                debug!(
                    pipeline_id = %pipeline_id,
                    retry_count = pipeline.retry_count,
                    "SCHEDULER: pipeline requeued"
                );
                self.try_admit();
            }
            Err(e) => {
                error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to requeue pipeline");
            }
        }
    }

    #[instrument(skip(self, reply))]
    fn handle_stop(&mut self, pipeline_id: PipelineId, reply: oneshot::Sender<Result<Pipeline>>) {
        let Some(status) = self.ctx.registry.status(pipeline_id) else {
            let _ = reply.send(Err(SchedulerError::NotFound(pipeline_id)));
            return;
        };

        match status {
            PipelineStatus::Queued | PipelineStatus::Retrying => {
                self.queue.remove(pipeline_id);
                if let Some(timer) = self.retry_timers.remove(&pipeline_id) {
                    timer.abort();
                }
                let result = self
                    .ctx
                    .registry
                    .transition(pipeline_id, PipelineEvent::stop());
                if let Ok(pipeline) = &result {
                    telemetry::record_stopped(&pipeline.source);
                    info!(pipeline_id = %pipeline_id, from = %status, "SCHEDULER: pipeline stopped");
                }
                let _ = reply.send(result);
            }
            PipelineStatus::Running => self.request_unit_stop(pipeline_id, reply),
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Stopped => {
                let _ = reply.send(Err(SchedulerError::InvalidState {
                    pipeline_id,
                    status,
                }));
            }
        }
    }

    fn request_unit_stop(
        &mut self,
        pipeline_id: PipelineId,
        reply: oneshot::Sender<Result<Pipeline>>,
    ) {
        let stop_timeout = self.ctx.config.execution.stop_timeout();
        let Some(unit) = self.running.get_mut(&pipeline_id) else {
            let _ = reply.send(Err(SchedulerError::Internal(format!(
                "pipeline {pipeline_id} is running without an execution unit"
            ))));
            return;
        };

        if let Some(pending) = unit.stop.as_mut() {
            pending.waiters.push(reply);
            return;
        }

        unit.handle.cancel.cancel();
        let attempt = unit.handle.attempt;
        let deadline_tx = self.stop_deadline_tx.clone();
        let deadline = tokio::spawn(async move {
            tokio::time::sleep(stop_timeout).await;
            let _ = deadline_tx.send((pipeline_id, attempt));
        })
        .abort_handle();

        unit.stop = Some(PendingStop {
            waiters: vec![reply],
            deadline,
        });
        debug!(pipeline_id = %pipeline_id, attempt, "SCHEDULER: cancellation requested");
    }

    /// The unit did not acknowledge cancellation in time; abort it and free the slot
    fn handle_stop_deadline(&mut self, pipeline_id: PipelineId, attempt: u32) {
        if !self.is_current_attempt(pipeline_id, attempt) {
            return;
        }
        let Some(unit) = self.running.remove(&pipeline_id) else {
            return;
        };
        let waiters = match unit.stop {
            Some(pending) => pending.waiters,
            None => Vec::new(),
        };

        warn!(
            pipeline_id = %pipeline_id,
            attempt,
            "SCHEDULER: unit missed stop deadline, aborting"
        );
        unit.handle.abort.abort();
        self.finalize_stop(pipeline_id, &unit.source, None, waiters);
        self.try_admit();
    }

    fn finalize_stop(
        &mut self,
        pipeline_id: PipelineId,
        source: &str,
        partial: Option<PipelineResult>,
        waiters: Vec<oneshot::Sender<Result<Pipeline>>>,
    ) {
        let result = self
            .ctx
            .registry
            .transition(pipeline_id, PipelineEvent::Stop { partial });

        match &result {
            Ok(_) => {
                telemetry::record_stopped(source);
                info!(pipeline_id = %pipeline_id, "SCHEDULER: pipeline stopped");
            }
            Err(e) => {
                error!(pipeline_id = %pipeline_id, error = %e, "SCHEDULER: failed to stop pipeline");
            }
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    fn sweep(&mut self) -> SweepReport {
        let pipelines_removed = self
            .ctx
            .registry
            .sweep(self.ctx.config.retention.pipeline_retention())
            .len();
        let templates_pruned = self.ctx.failure_templates.write().prune();

        if pipelines_removed > 0 || templates_pruned > 0 {
            info!(
                pipelines_removed,
                templates_pruned, "SCHEDULER: retention sweep completed"
            );
        }
        SweepReport {
            pipelines_removed,
            templates_pruned,
        }
    }

    /// Stop everything still in flight; the coordinator exits afterwards
    fn shutdown(&mut self) {
        info!(
            running = self.running.len(),
            queued = self.queue.len(),
            retrying = self.retry_timers.len(),
            "SCHEDULER: shutting down"
        );

        let running: Vec<(PipelineId, RunningUnit)> = self.running.drain().collect();
        for (pipeline_id, unit) in running {
            unit.handle.cancel.cancel();
            unit.handle.abort.abort();
            let waiters = match unit.stop {
                Some(pending) => {
                    pending.deadline.abort();
                    pending.waiters
                }
                None => Vec::new(),
            };
            self.finalize_stop(pipeline_id, &unit.source, None, waiters);
        }

        let retrying: Vec<(PipelineId, AbortHandle)> = self.retry_timers.drain().collect();
        for (pipeline_id, timer) in retrying {
            timer.abort();
            self.stop_pending(pipeline_id);
        }

        for pipeline_id in self.queue.drain_ordered() {
            self.stop_pending(pipeline_id);
        }
    }

    fn stop_pending(&mut self, pipeline_id: PipelineId) {
        if let Ok(pipeline) = self
            .ctx
            .registry
            .transition(pipeline_id, PipelineEvent::stop())
        {
            telemetry::record_stopped(&pipeline.source);
        }
    }
}
