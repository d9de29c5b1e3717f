//! # Pipeline Registry
//!
//! Single source of truth for pipeline records.
//!
//! ## Overview
//!
//! The registry owns every [`Pipeline`] the scheduler knows about. Reads are open to
//! any thread and return snapshots; writes (`create`, `transition`,
//! `record_progress`, `sweep`) are crate-private and only the coordinator calls
//! them, so there is exactly one writer.
//!
//! Every status transition goes through the pipeline state machine and publishes
//! a [`LifecycleEvent`] carrying the new state.

use crate::error::{Result, SchedulerError};
use crate::events::{EventBus, LifecycleEvent};
use crate::models::{Pipeline, PipelineId, PipelineRequest};
use crate::state_machine::{determine_target_state, PipelineEvent, PipelineStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Number of pipelines per status at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

impl StatusCounts {
    fn increment(&mut self, status: PipelineStatus) {
        match status {
            PipelineStatus::Queued => self.queued += 1,
            PipelineStatus::Running => self.running += 1,
            PipelineStatus::Retrying => self.retrying += 1,
            PipelineStatus::Completed => self.completed += 1,
            PipelineStatus::Failed => self.failed += 1,
            PipelineStatus::Stopped => self.stopped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.retrying + self.completed + self.failed + self.stopped
    }
}

/// Thread-safe in-memory table of all known pipelines
#[derive(Debug, Clone)]
pub struct PipelineRegistry {
    pipelines: Arc<RwLock<HashMap<PipelineId, Pipeline>>>,
    sequence: Arc<AtomicU64>,
    event_bus: EventBus,
}

impl PipelineRegistry {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            pipelines: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            event_bus,
        }
    }

    /// Validate the request and insert a new `queued` pipeline
    pub(crate) fn create(&self, request: PipelineRequest) -> Result<Pipeline> {
        request.validate()?;

        let id = PipelineId::new();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let pipeline = Pipeline::new(id, request, sequence);

        self.pipelines.write().insert(id, pipeline.clone());

        self.event_bus.publish(LifecycleEvent::Queued {
            pipeline_id: id,
            priority: pipeline.priority,
            retry_count: 0,
            timestamp: pipeline.created_at,
        });

        Ok(pipeline)
    }

    pub fn get(&self, id: PipelineId) -> Result<Pipeline> {
        self.pipelines
            .read()
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::NotFound(id))
    }

    pub fn status(&self, id: PipelineId) -> Option<PipelineStatus> {
        self.pipelines.read().get(&id).map(|p| p.status)
    }

    /// All pipelines in submission order
    pub fn list_all(&self) -> Vec<Pipeline> {
        let mut pipelines: Vec<Pipeline> = self.pipelines.read().values().cloned().collect();
        pipelines.sort_by_key(|p| p.sequence);
        pipelines
    }

    pub fn list_by_status(&self, status: PipelineStatus) -> Vec<Pipeline> {
        let mut pipelines: Vec<Pipeline> = self
            .pipelines
            .read()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        pipelines.sort_by_key(|p| p.sequence);
        pipelines
    }

    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        self.counts_and_throughput(Utc::now()).0
    }

    /// Status counts plus the number of completions after `since`, read under one lock
    pub fn counts_and_throughput(&self, since: DateTime<Utc>) -> (StatusCounts, usize) {
        let pipelines = self.pipelines.read();
        let mut counts = StatusCounts::default();
        let mut completed_recently = 0;
        for pipeline in pipelines.values() {
            counts.increment(pipeline.status);
            if pipeline
                .completed_at
                .is_some_and(|completed_at| completed_at > since)
            {
                completed_recently += 1;
            }
        }
        (counts, completed_recently)
    }

    /// Apply a lifecycle event; the only path that changes a pipeline's status
    pub(crate) fn transition(&self, id: PipelineId, event: PipelineEvent) -> Result<Pipeline> {
        let (snapshot, lifecycle_event) = {
            let mut pipelines = self.pipelines.write();
            let pipeline = pipelines.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;

            let target = determine_target_state(pipeline.status, &event)
                .map_err(|e| SchedulerError::from_state_machine(id, e))?;

            let now = Utc::now();
            pipeline.status = target;
            let lifecycle_event = apply_event(pipeline, event, now);
            (pipeline.clone(), lifecycle_event)
        };

        self.event_bus.publish(lifecycle_event);
        Ok(snapshot)
    }

    /// Record progress of the running attempt.
    ///
    /// Item counters belong to the current attempt and updates that would move them
    /// backwards are ignored. The percentage never drops below the highest value any
    /// attempt of this pipeline has reported, so a retried attempt reports the
    /// previous high-water mark until it overtakes it.
    pub(crate) fn record_progress(
        &self,
        id: PipelineId,
        percent: u8,
        processed_items: usize,
        total_items: usize,
    ) -> bool {
        let event = {
            let mut pipelines = self.pipelines.write();
            let Some(pipeline) = pipelines.get_mut(&id) else {
                return false;
            };
            if pipeline.status != PipelineStatus::Running
                || processed_items < pipeline.processed_items
            {
                return false;
            }

            pipeline.progress = percent.min(100).max(pipeline.progress);
            pipeline.processed_items = processed_items;
            pipeline.total_items = total_items.max(pipeline.total_items);

            LifecycleEvent::Progress {
                pipeline_id: id,
                percent: pipeline.progress,
                processed_items: pipeline.processed_items,
                total_items: pipeline.total_items,
                timestamp: Utc::now(),
            }
        };

        self.event_bus.publish(event);
        true
    }

    /// Remove terminal pipelines that finished more than `retention` ago
    pub(crate) fn sweep(&self, retention: Duration) -> Vec<PipelineId> {
        let retention = chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut pipelines = self.pipelines.write();
        let expired: Vec<PipelineId> = pipelines
            .values()
            .filter(|p| p.finished_at().is_some_and(|finished| finished < cutoff))
            .map(|p| p.id)
            .collect();

        for id in &expired {
            pipelines.remove(id);
        }
        expired
    }
}

/// Write the fields that accompany a transition and build the matching event
fn apply_event(pipeline: &mut Pipeline, event: PipelineEvent, now: DateTime<Utc>) -> LifecycleEvent {
    let id = pipeline.id;
    match event {
        PipelineEvent::Start => {
            pipeline.attempts += 1;
            if pipeline.started_at.is_none() {
                pipeline.started_at = Some(now);
            }
            pipeline.processed_items = 0;
            pipeline.total_items = 0;
            LifecycleEvent::Started {
                pipeline_id: id,
                attempt: pipeline.attempts,
                timestamp: now,
            }
        }
        PipelineEvent::Complete(result) => {
            pipeline.completed_at = Some(now);
            pipeline.progress = 100;
            pipeline.processed_items = pipeline.processed_items.max(result.processed_count());
            pipeline.total_items = pipeline.total_items.max(result.total_items);
            let event = LifecycleEvent::Completed {
                pipeline_id: id,
                processing_time_ms: result.processing_time_ms,
                succeeded_items: result.success_count(),
                failed_items: result.failed_items.len(),
                timestamp: now,
            };
            pipeline.result = Some(result);
            event
        }
        PipelineEvent::Retry { error, partial } => {
            pipeline.retry_count += 1;
            pipeline.last_error = Some(error.clone());
            if partial.is_some() {
                pipeline.partial_result = partial;
            }
            LifecycleEvent::Retrying {
                pipeline_id: id,
                retry_count: pipeline.retry_count,
                error,
                timestamp: now,
            }
        }
        PipelineEvent::Requeue => LifecycleEvent::Queued {
            pipeline_id: id,
            priority: pipeline.priority,
            retry_count: pipeline.retry_count,
            timestamp: now,
        },
        PipelineEvent::Fail { error, partial } => {
            pipeline.failed_at = Some(now);
            pipeline.error = Some(error.clone());
            pipeline.last_error = Some(error.clone());
            if partial.is_some() {
                pipeline.partial_result = partial;
            }
            LifecycleEvent::Failed {
                pipeline_id: id,
                retry_count: pipeline.retry_count,
                error,
                timestamp: now,
            }
        }
        PipelineEvent::Stop { partial } => {
            pipeline.stopped_at = Some(now);
            if partial.is_some() {
                pipeline.partial_result = partial;
            }
            LifecycleEvent::Stopped {
                pipeline_id: id,
                timestamp: now,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::models::PipelineResult;

    fn registry() -> PipelineRegistry {
        PipelineRegistry::new(EventBus::new(64))
    }

    fn request() -> PipelineRequest {
        PipelineRequest::new("youtube", "video-1")
    }

    #[test]
    fn test_create_assigns_increasing_sequence() {
        let registry = registry();
        let first = registry.create(request()).unwrap();
        let second = registry.create(request()).unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.sequence < second.sequence);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(first.id).unwrap().status, PipelineStatus::Queued);
    }

    #[test]
    fn test_create_rejects_empty_source() {
        let registry = registry();
        let err = registry
            .create(PipelineRequest::new("", "video-1"))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let id = PipelineId::new();
        assert_eq!(registry().get(id).unwrap_err(), SchedulerError::NotFound(id));
    }

    #[test]
    fn test_transition_sets_timestamps_once() {
        let registry = registry();
        let id = registry.create(request()).unwrap().id;

        let running = registry.transition(id, PipelineEvent::Start).unwrap();
        assert_eq!(running.status, PipelineStatus::Running);
        assert_eq!(running.attempts, 1);
        let first_start = running.started_at.unwrap();

        registry
            .transition(
                id,
                PipelineEvent::Retry {
                    error: "ETIMEDOUT".into(),
                    partial: None,
                },
            )
            .unwrap();
        registry.transition(id, PipelineEvent::Requeue).unwrap();
        let rerun = registry.transition(id, PipelineEvent::Start).unwrap();
        assert_eq!(rerun.started_at.unwrap(), first_start);
        assert_eq!(rerun.attempts, 2);
        assert_eq!(rerun.retry_count, 1);
        assert_eq!(rerun.last_error.as_deref(), Some("ETIMEDOUT"));

        let done = registry
            .transition(id, PipelineEvent::Complete(PipelineResult::with_total(0)))
            .unwrap();
        assert_eq!(done.status, PipelineStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.failed_at.is_none());
        assert!(done.stopped_at.is_none());
        assert!(done.result.is_some());
        assert_eq!(done.progress, 100);
    }

    #[test]
    fn test_invalid_transition_is_rejected_and_state_unchanged() {
        let registry = registry();
        let id = registry.create(request()).unwrap().id;
        registry.transition(id, PipelineEvent::Start).unwrap();
        registry
            .transition(id, PipelineEvent::Complete(PipelineResult::default()))
            .unwrap();

        let err = registry.transition(id, PipelineEvent::Start).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTransition {
                from: PipelineStatus::Completed,
                to: PipelineStatus::Running,
                ..
            }
        ));
        assert_eq!(registry.status(id), Some(PipelineStatus::Completed));
    }

    #[test]
    fn test_every_transition_publishes_its_state() {
        let bus = EventBus::new(64);
        let registry = PipelineRegistry::new(bus.clone());
        let mut events = bus.subscribe_all();

        let id = registry.create(request()).unwrap().id;
        registry.transition(id, PipelineEvent::Start).unwrap();
        registry.transition(id, PipelineEvent::stop()).unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv())
            .map(|e| (e.kind(), e.status()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Queued, Some(PipelineStatus::Queued)),
                (EventKind::Started, Some(PipelineStatus::Running)),
                (EventKind::Stopped, Some(PipelineStatus::Stopped)),
            ]
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_requires_running() {
        let registry = registry();
        let id = registry.create(request()).unwrap().id;

        assert!(!registry.record_progress(id, 25, 0, 10));

        registry.transition(id, PipelineEvent::Start).unwrap();
        assert!(registry.record_progress(id, 25, 0, 10));
        assert!(registry.record_progress(id, 50, 5, 10));
        assert!(!registry.record_progress(id, 40, 4, 10));

        let pipeline = registry.get(id).unwrap();
        assert_eq!(pipeline.progress, 50);
        assert_eq!(pipeline.processed_items, 5);
        assert_eq!(pipeline.total_items, 10);
    }

    #[test]
    fn test_progress_floor_survives_retries() {
        let registry = registry();
        let id = registry.create(request()).unwrap().id;
        let mut events = registry.event_bus.subscribe(&[EventKind::Progress]);

        registry.transition(id, PipelineEvent::Start).unwrap();
        assert!(registry.record_progress(id, 75, 10, 10));
        registry
            .transition(
                id,
                PipelineEvent::Retry {
                    error: "All 10 items failed processing".into(),
                    partial: None,
                },
            )
            .unwrap();
        registry.transition(id, PipelineEvent::Requeue).unwrap();
        registry.transition(id, PipelineEvent::Start).unwrap();

        let restarted = registry.get(id).unwrap();
        assert_eq!(restarted.progress, 75);
        assert_eq!(restarted.processed_items, 0);

        assert!(registry.record_progress(id, 0, 0, 0));
        assert!(registry.record_progress(id, 50, 5, 10));
        assert!(registry.record_progress(id, 100, 10, 10));

        let percents: Vec<u8> = std::iter::from_fn(|| events.try_recv())
            .filter_map(|event| match event {
                LifecycleEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![75, 75, 75, 100]);
    }

    #[test]
    fn test_counts_and_throughput() {
        let registry = registry();
        let a = registry.create(request()).unwrap().id;
        let b = registry.create(request()).unwrap().id;
        registry.create(request()).unwrap();

        registry.transition(a, PipelineEvent::Start).unwrap();
        registry
            .transition(a, PipelineEvent::Complete(PipelineResult::default()))
            .unwrap();
        registry.transition(b, PipelineEvent::Start).unwrap();

        let (counts, recent) =
            registry.counts_and_throughput(Utc::now() - chrono::Duration::seconds(60));
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.running, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(recent, 1);
    }

    #[test]
    fn test_sweep_removes_only_old_terminal_pipelines() {
        let registry = registry();
        let done = registry.create(request()).unwrap().id;
        let queued = registry.create(request()).unwrap().id;
        registry.transition(done, PipelineEvent::Start).unwrap();
        registry
            .transition(done, PipelineEvent::Complete(PipelineResult::default()))
            .unwrap();

        assert!(registry.sweep(Duration::from_secs(3600)).is_empty());

        std::thread::sleep(Duration::from_millis(2));
        let removed = registry.sweep(Duration::ZERO);
        assert_eq!(removed, vec![done]);
        assert!(registry.get(done).is_err());
        assert!(registry.get(queued).is_ok());
    }
}
