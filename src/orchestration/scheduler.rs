//! # Pipeline Scheduler
//!
//! Public, transport-agnostic API of the concurrent pipeline scheduler.
//!
//! ## Overview
//!
//! `PipelineScheduler` is a cheap `Clone` handle. Mutating operations (submit, stop,
//! sweep, shutdown) are forwarded to the coordinator task and answered over a
//! `oneshot` channel; read operations (status, listings, metrics, failure reports)
//! read the shared registries directly and never wait on the coordinator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use feedpulse_core::config::SchedulerConfig;
//! use feedpulse_core::execution::{Collector, StageError};
//! use feedpulse_core::models::{PipelineRequest, Priority, SourceItem};
//! use feedpulse_core::PipelineScheduler;
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! struct YoutubeComments;
//!
//! #[async_trait]
//! impl Collector for YoutubeComments {
//!     async fn collect(&self, _: &str, video_id: &str, _: &Value) -> Result<Vec<SourceItem>, StageError> {
//!         Ok(vec![SourceItem::new(format!("{video_id}-c1"), "love this")])
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = PipelineScheduler::builder(SchedulerConfig::default())
//!     .with_collector("youtube", Arc::new(YoutubeComments))
//!     .build()?;
//!
//! let id = scheduler
//!     .submit(PipelineRequest::new("youtube", "dQw4w9WgXcQ").with_priority(Priority::High))
//!     .await?;
//! println!("{:?}", scheduler.get_status(id)?.status);
//!
//! scheduler.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::coordinator::{Command, Coordinator, CoordinatorContext, SweepReport};
use super::failure_analyzer::{FailureReport, FailureTemplateStore};
use super::metrics::{MetricsAggregator, MetricsSnapshot};
use super::runtime::SchedulerRuntimes;
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::events::{EventBus, EventKind, EventSubscription};
use crate::execution::{Collector, PassthroughProcessor, Processor};
use crate::models::{FailureTemplate, Pipeline, PipelineId, PipelineRequest};
use crate::registry::{CollectorRegistry, PipelineRegistry};
use crate::state_machine::PipelineStatus;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument};

/// Builder for [`PipelineScheduler`]
pub struct PipelineSchedulerBuilder {
    config: SchedulerConfig,
    collectors: CollectorRegistry,
    processor: Arc<dyn Processor>,
}

impl PipelineSchedulerBuilder {
    pub fn with_collector(self, source: impl Into<String>, collector: Arc<dyn Collector>) -> Self {
        self.collectors.register(source, collector);
        self
    }

    /// Processor used for every item; defaults to [`PassthroughProcessor`]
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = processor;
        self
    }

    /// Validate the configuration and start the coordinator.
    ///
    /// The coordinator gets its own thread and runtime, and execution units get a
    /// runtime with one worker per concurrency slot; neither borrows the caller's
    /// runtime.
    pub fn build(self) -> Result<PipelineScheduler> {
        self.config.validate()?;
        let runtimes = SchedulerRuntimes::build(&self.config)?;
        let units = runtimes.units_handle().ok_or_else(|| {
            SchedulerError::Internal("execution unit runtime is not available".to_string())
        })?;

        let event_bus = EventBus::new(self.config.events.channel_capacity);
        let ctx = CoordinatorContext {
            registry: PipelineRegistry::new(event_bus.clone()),
            collectors: self.collectors,
            processor: self.processor,
            event_bus,
            metrics: MetricsAggregator::new(),
            failure_templates: Arc::new(RwLock::new(FailureTemplateStore::new(
                self.config.retention.failure_template_capacity,
                self.config.retention.failure_template_max_age(),
            ))),
            config: self.config,
        };

        let (command_tx, command_rx) = mpsc::channel(ctx.config.command_buffer);
        let coordinator = Coordinator::new(ctx.clone(), command_rx, units);
        let (done_tx, done_rx) = oneshot::channel();
        runtimes.run_coordinator(coordinator, done_tx)?;

        info!(
            sources = ?ctx.collectors.sources(),
            "SCHEDULER: pipeline scheduler started"
        );

        Ok(PipelineScheduler {
            inner: Arc::new(SchedulerInner {
                ctx,
                commands: command_tx,
                coordinator_done: Mutex::new(Some(done_rx)),
            }),
        })
    }
}

struct SchedulerInner {
    ctx: CoordinatorContext,
    commands: mpsc::Sender<Command>,
    /// Fires once the coordinator thread has exited
    coordinator_done: Mutex<Option<oneshot::Receiver<()>>>,
}

/// Handle to a running scheduler; clones share the same coordinator
#[derive(Clone)]
pub struct PipelineScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for PipelineScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineScheduler")
            .field("config", &self.inner.ctx.config)
            .field("pipelines", &self.inner.ctx.registry.len())
            .field("sources", &self.inner.ctx.collectors.sources())
            .finish()
    }
}

impl PipelineScheduler {
    pub fn builder(config: SchedulerConfig) -> PipelineSchedulerBuilder {
        PipelineSchedulerBuilder {
            config,
            collectors: CollectorRegistry::new(),
            processor: Arc::new(PassthroughProcessor),
        }
    }

    /// Start a scheduler with no collectors and the passthrough processor
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send(command(reply))
            .await
            .map_err(|_| SchedulerError::ShuttingDown)?;
        response.await.map_err(|_| SchedulerError::ShuttingDown)
    }

    /// Create a queued pipeline; returns once it is queued or admitted
    #[instrument(skip(self, request), fields(source = %request.source))]
    pub async fn submit(&self, request: PipelineRequest) -> Result<PipelineId> {
        self.request(|reply| Command::Submit { request, reply })
            .await?
    }

    /// Submit several pipelines; entries succeed or fail independently
    pub async fn submit_batch(&self, requests: Vec<PipelineRequest>) -> Vec<Result<PipelineId>> {
        let count = requests.len();
        match self
            .request(|reply| Command::SubmitBatch { requests, reply })
            .await
        {
            Ok(results) => results,
            Err(e) => (0..count).map(|_| Err(e.clone())).collect(),
        }
    }

    pub fn get_status(&self, pipeline_id: PipelineId) -> Result<Pipeline> {
        self.inner.ctx.registry.get(pipeline_id)
    }

    pub fn list_all(&self) -> Vec<Pipeline> {
        self.inner.ctx.registry.list_all()
    }

    pub fn list_by_status(&self, status: PipelineStatus) -> Vec<Pipeline> {
        self.inner.ctx.registry.list_by_status(status)
    }

    /// Stop a queued, retrying or running pipeline.
    ///
    /// A running pipeline is stopped at its next batch boundary, or aborted once
    /// `execution.stop_timeout_ms` has elapsed. Terminal pipelines yield `InvalidState`.
    #[instrument(skip(self))]
    pub async fn stop(&self, pipeline_id: PipelineId) -> Result<Pipeline> {
        self.request(|reply| Command::Stop { pipeline_id, reply })
            .await?
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.ctx.metrics.snapshot(&self.inner.ctx.registry)
    }

    /// Subscribe to lifecycle events; an empty `kinds` slice receives everything
    pub fn subscribe(&self, kinds: &[EventKind]) -> EventSubscription {
        self.inner.ctx.event_bus.subscribe(kinds)
    }

    pub fn register_collector(&self, source: impl Into<String>, collector: Arc<dyn Collector>) {
        self.inner.ctx.collectors.register(source, collector);
    }

    /// Stop accepting `source`; queued pipelines for it fail their next attempt
    pub fn unregister_collector(&self, source: &str) -> bool {
        self.inner.ctx.collectors.remove(source)
    }

    pub fn supported_sources(&self) -> Vec<String> {
        self.inner.ctx.collectors.sources()
    }

    /// Retained failure templates, oldest first
    pub fn failure_templates(&self) -> Vec<FailureTemplate> {
        self.inner.ctx.failure_templates.read().templates()
    }

    pub fn failure_report(&self) -> FailureReport {
        self.inner.ctx.failure_templates.read().report()
    }

    /// Run the retention sweep now instead of waiting for the next interval
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        self.request(|reply| Command::Sweep { reply }).await
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.ctx.config
    }

    /// Stop all in-flight work and end the coordinator.
    ///
    /// Running, queued and retrying pipelines end `stopped`. Later mutating calls
    /// return [`SchedulerError::ShuttingDown`].
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await?;

        let done = self.inner.coordinator_done.lock().take();
        if let Some(done) = done {
            done.await.map_err(|_| {
                SchedulerError::Internal("coordinator thread exited without signalling".to_string())
            })?;
        }
        Ok(())
    }
}
