#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # FeedPulse Core
//!
//! Concurrent pipeline scheduler for feed ingestion and analysis.
//!
//! ## Overview
//!
//! FeedPulse Core accepts pipeline requests (collect items from a source, then run
//! every item through an analysis processor), admits them against a fixed
//! concurrency budget, runs each one in an isolated execution unit, retries
//! transient failures with back-off and produces failure templates for pattern
//! analysis when a pipeline fails for good.
//!
//! ## Architecture
//!
//! A single coordinator task serializes every queue and registry mutation; only
//! execution units run in parallel, up to `max_concurrent_pipelines` at once.
//!
//! ```text
//! PipelineScheduler ──commands──▶ Coordinator ──spawn──▶ ExecutionUnit (×N)
//!        │                          │    ▲                     │
//!        │ reads                    │    └──── UnitMessage ────┘
//!        ▼                          ▼
//!  PipelineRegistry ◀── writes ─────┘ ──▶ EventBus ──▶ subscribers
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Pipeline records, items and failure templates
//! - [`state_machine`] - Pipeline lifecycle states and transitions
//! - [`registry`] - Pipeline and collector registries
//! - [`execution`] - Execution units and the `Collector`/`Processor` seams
//! - [`orchestration`] - Scheduler API, coordinator, queue, retries, analytics
//! - [`events`] - Typed lifecycle event bus
//! - [`config`] - Layered configuration
//! - [`error`] - Caller-facing error taxonomy
//! - [`logging`] / [`telemetry`] - Structured logging and OpenTelemetry counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feedpulse_core::config::ConfigManager;
//! use feedpulse_core::events::EventKind;
//! use feedpulse_core::{PipelineRequest, PipelineScheduler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! feedpulse_core::logging::init_structured_logging();
//! let config = ConfigManager::load(None)?;
//!
//! let scheduler = PipelineScheduler::builder(config).build()?;
//! let mut events = scheduler.subscribe(&[EventKind::Completed, EventKind::Failed]);
//!
//! // Requires a collector registered for "youtube"
//! let id = scheduler.submit(PipelineRequest::new("youtube", "dQw4w9WgXcQ")).await?;
//! while let Some(event) = events.recv().await {
//!     if event.pipeline_id() == id {
//!         break;
//!     }
//! }
//! println!("{:?}", scheduler.metrics());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod telemetry;

pub use config::{ConfigManager, SchedulerConfig};
pub use error::{Result, SchedulerError};
pub use events::{EventBus, EventKind, EventSubscription, LifecycleEvent};
pub use execution::{Collector, ExecutionError, Processor, StageError};
pub use models::{FailureTemplate, Pipeline, PipelineId, PipelineRequest, Priority, SourceItem};
pub use orchestration::{FailureReport, MetricsSnapshot, PipelineScheduler, SweepReport};
pub use state_machine::PipelineStatus;
