//! # Orchestration
//!
//! Admission control, queueing, retries and failure analytics.
//!
//! ## Core Components
//!
//! - **PipelineScheduler**: public API handle; forwards mutations to the coordinator
//! - **Coordinator**: single task that owns the queue and serializes registry writes
//! - **PipelineQueue**: priority index of pipelines waiting for a slot
//! - **RetryController**: retry budget and back-off delay
//! - **FailurePatternAnalyzer**: tags permanent failures and builds failure templates
//! - **MetricsAggregator**: running totals and averages for metrics snapshots

pub mod coordinator;
pub mod failure_analyzer;
pub mod metrics;
pub mod queue;
pub mod retry;
mod runtime;
pub mod scheduler;

pub use coordinator::SweepReport;
pub use failure_analyzer::{
    FailurePatternAnalyzer, FailureReport, FailureTemplateStore, PatternCount,
};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use queue::{PipelineQueue, QueueEntry};
pub use retry::{RetryController, RetryDecision};
pub use scheduler::{PipelineScheduler, PipelineSchedulerBuilder};
