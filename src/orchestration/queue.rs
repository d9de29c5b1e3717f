//! # Pipeline Queue
//!
//! Priority index of pipelines waiting for admission.
//!
//! The queue holds ids only; pipeline state lives in the registry. Ordering is strict
//! priority bucket first (`high` before `normal` before `low`), then submission
//! sequence. A retried pipeline is re-inserted with its original sequence, so it keeps
//! its place ahead of work submitted after it.

use crate::models::{PipelineId, Priority};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Heap entry; `Ord` is arranged so the max-heap pops the next pipeline to admit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub pipeline_id: PipelineId,
    pub priority: Priority,
    /// Original submission sequence, kept across retries
    pub sequence: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower rank first, then lower sequence (older) first
        other
            .priority
            .rank()
            .cmp(&self.priority.rank())
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.pipeline_id.cmp(&self.pipeline_id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Removal is lazy: removed ids leave stale heap entries that `pop` skips
#[derive(Debug, Default)]
pub struct PipelineQueue {
    heap: BinaryHeap<QueueEntry>,
    members: HashSet<PipelineId>,
}

impl PipelineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pipeline; returns `false` if it is already queued
    pub fn push(&mut self, pipeline_id: PipelineId, priority: Priority, sequence: u64) -> bool {
        if !self.members.insert(pipeline_id) {
            return false;
        }
        self.heap.push(QueueEntry {
            pipeline_id,
            priority,
            sequence,
        });
        true
    }

    /// Next pipeline to admit
    pub fn pop(&mut self) -> Option<QueueEntry> {
        while let Some(entry) = self.heap.pop() {
            if self.members.remove(&entry.pipeline_id) {
                return Some(entry);
            }
        }
        None
    }

    pub fn remove(&mut self, pipeline_id: PipelineId) -> bool {
        let removed = self.members.remove(&pipeline_id);
        if removed && self.heap.len() > 2 * self.members.len() + 16 {
            let members = &self.members;
            self.heap.retain(|entry| members.contains(&entry.pipeline_id));
        }
        removed
    }

    pub fn contains(&self, pipeline_id: PipelineId) -> bool {
        self.members.contains(&pipeline_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Queued ids in admission order
    pub fn drain_ordered(&mut self) -> Vec<PipelineId> {
        std::iter::from_fn(|| self.pop())
            .map(|entry| entry.pipeline_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_buckets_dequeue_in_order() {
        let mut queue = PipelineQueue::new();
        let low = PipelineId::new();
        let normal = PipelineId::new();
        let high = PipelineId::new();

        queue.push(low, Priority::Low, 0);
        queue.push(normal, Priority::Normal, 1);
        queue.push(high, Priority::High, 2);

        assert_eq!(queue.drain_ordered(), vec![high, normal, low]);
    }

    #[test]
    fn test_fifo_within_bucket_uses_original_sequence() {
        let mut queue = PipelineQueue::new();
        let retried = PipelineId::new();
        let newer = PipelineId::new();

        queue.push(newer, Priority::Normal, 10);
        // Re-inserted after a retry with its original, older sequence
        queue.push(retried, Priority::Normal, 3);

        assert_eq!(queue.pop().unwrap().pipeline_id, retried);
        assert_eq!(queue.pop().unwrap().pipeline_id, newer);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_duplicate_push_is_rejected() {
        let mut queue = PipelineQueue::new();
        let id = PipelineId::new();
        assert!(queue.push(id, Priority::High, 0));
        assert!(!queue.push(id, Priority::High, 0));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_removed_entries_are_skipped() {
        let mut queue = PipelineQueue::new();
        let a = PipelineId::new();
        let b = PipelineId::new();
        queue.push(a, Priority::High, 0);
        queue.push(b, Priority::Low, 1);

        assert!(queue.remove(a));
        assert!(!queue.remove(a));
        assert!(!queue.contains(a));
        assert_eq!(queue.pop().unwrap().pipeline_id, b);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_then_push_again() {
        let mut queue = PipelineQueue::new();
        let id = PipelineId::new();
        queue.push(id, Priority::Normal, 5);
        queue.remove(id);
        assert!(queue.push(id, Priority::Normal, 5));
        assert_eq!(queue.pop().unwrap().pipeline_id, id);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_heap_is_compacted_after_many_removals() {
        let mut queue = PipelineQueue::new();
        let ids: Vec<_> = (0..100).map(|_| PipelineId::new()).collect();
        for (seq, id) in ids.iter().enumerate() {
            queue.push(*id, Priority::Normal, seq as u64);
        }
        for id in &ids[..90] {
            queue.remove(*id);
        }
        assert_eq!(queue.len(), 10);
        assert!(queue.heap.len() <= 2 * queue.len() + 16);
        assert_eq!(queue.drain_ordered(), ids[90..].to_vec());
    }
}
