//! # Metrics Aggregator
//!
//! Running counters and averages derived from terminal pipelines.
//!
//! The aggregator is updated by the coordinator once per terminal outcome. Snapshots
//! combine it with live status counts read from the registry, so `active` and
//! `queued` always reflect the registry at the instant of the call.

use crate::registry::{PipelineRegistry, StatusCounts};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time view of scheduler throughput and health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Pipelines currently running
    pub active: usize,
    pub queued: usize,
    pub retrying: usize,
    /// Completed pipelines still held by the registry
    pub completed: usize,
    /// Failed pipelines still held by the registry
    pub failed: usize,
    pub stopped: usize,
    /// Lifetime count of pipelines that reached `completed` or `failed`
    pub total_processed: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    /// `total_completed / total_processed`, 0.0 before the first terminal outcome
    pub success_rate: f64,
    /// Running average over successful attempts
    pub avg_processing_time_ms: f64,
    /// Completions within the last 60 seconds
    pub throughput_per_minute: usize,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Totals {
    completed: u64,
    failed: u64,
    avg_processing_time_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    totals: Arc<Mutex<Totals>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful pipeline
    pub(crate) fn record_completion(&self, processing_time_ms: u64) {
        let mut totals = self.totals.lock();
        totals.completed += 1;
        let n = totals.completed as f64;
        totals.avg_processing_time_ms =
            (totals.avg_processing_time_ms * (n - 1.0) + processing_time_ms as f64) / n;
    }

    /// Record one permanent failure
    pub(crate) fn record_failure(&self) {
        self.totals.lock().failed += 1;
    }

    pub fn snapshot(&self, registry: &PipelineRegistry) -> MetricsSnapshot {
        let taken_at = Utc::now();
        let (counts, throughput_per_minute) =
            registry.counts_and_throughput(taken_at - chrono::Duration::seconds(60));
        let totals = self.totals.lock();
        build_snapshot(counts, throughput_per_minute, &totals, taken_at)
    }
}

fn build_snapshot(
    counts: StatusCounts,
    throughput_per_minute: usize,
    totals: &Totals,
    taken_at: DateTime<Utc>,
) -> MetricsSnapshot {
    let total_processed = totals.completed + totals.failed;
    let success_rate = if total_processed == 0 {
        0.0
    } else {
        totals.completed as f64 / total_processed as f64
    };

    MetricsSnapshot {
        active: counts.running,
        queued: counts.queued,
        retrying: counts.retrying,
        completed: counts.completed,
        failed: counts.failed,
        stopped: counts.stopped,
        total_processed,
        total_completed: totals.completed,
        total_failed: totals.failed,
        success_rate,
        avg_processing_time_ms: totals.avg_processing_time_ms,
        throughput_per_minute,
        taken_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    #[test]
    fn test_running_average() {
        let metrics = MetricsAggregator::new();
        metrics.record_completion(100);
        metrics.record_completion(200);
        metrics.record_completion(600);

        let snapshot = metrics.snapshot(&PipelineRegistry::new(EventBus::default()));
        assert!((snapshot.avg_processing_time_ms - 300.0).abs() < 1e-9);
        assert_eq!(snapshot.total_completed, 3);
    }

    #[test]
    fn test_failures_do_not_move_average() {
        let metrics = MetricsAggregator::new();
        metrics.record_completion(100);
        metrics.record_failure();

        let snapshot = metrics.snapshot(&PipelineRegistry::new(EventBus::default()));
        assert!((snapshot.avg_processing_time_ms - 100.0).abs() < 1e-9);
        assert_eq!(snapshot.total_processed, 2);
        assert!((snapshot.success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot =
            MetricsAggregator::new().snapshot(&PipelineRegistry::new(EventBus::default()));
        assert_eq!(snapshot.total_processed, 0);
        assert_eq!(snapshot.success_rate, 0.0);
        assert_eq!(snapshot.throughput_per_minute, 0);
        assert_eq!(snapshot.active, 0);
    }
}
