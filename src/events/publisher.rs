//! # Event Bus
//!
//! Broadcast fan-out of [`LifecycleEvent`]s with per-subscriber kind filters.
//!
//! ## Usage
//!
//! ```rust
//! use feedpulse_core::events::{EventBus, EventKind, LifecycleEvent};
//! use feedpulse_core::models::PipelineId;
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new(16);
//! let mut stopped = bus.subscribe(&[EventKind::Stopped]);
//!
//! bus.publish(LifecycleEvent::Stopped {
//!     pipeline_id: PipelineId::new(),
//!     timestamp: chrono::Utc::now(),
//! });
//!
//! let event = stopped.recv().await.unwrap();
//! assert_eq!(event.kind(), EventKind::Stopped);
//! # });
//! ```

use super::types::{EventKind, LifecycleEvent};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Typed fan-out bus for pipeline lifecycle events.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// dropped, and a subscriber that falls more than the channel capacity behind
/// skips the events it missed.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber
    pub fn publish(&self, event: LifecycleEvent) {
        trace!(
            event = event.kind().name(),
            pipeline_id = %event.pipeline_id(),
            "EVENT_BUS: publishing"
        );
        // send() only errors when nobody is listening, which is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to the given event kinds; an empty slice subscribes to everything
    pub fn subscribe(&self, kinds: &[EventKind]) -> EventSubscription {
        let filter = if kinds.is_empty() {
            None
        } else {
            Some(kinds.iter().copied().collect())
        };
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscribe_all(&self) -> EventSubscription {
        self.subscribe(&[])
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EVENT_CHANNEL_CAPACITY)
    }
}

/// Subscriber handle returned by [`EventBus::subscribe`]
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<LifecycleEvent>,
    filter: Option<HashSet<EventKind>>,
}

impl EventSubscription {
    fn accepts(&self, event: &LifecycleEvent) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&event.kind()))
    }

    /// Wait for the next matching event; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "EVENT_BUS: subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "EVENT_BUS: subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PipelineId;
    use chrono::Utc;

    fn stopped(id: PipelineId) -> LifecycleEvent {
        LifecycleEvent::Stopped {
            pipeline_id: id,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.publish(stopped(PipelineId::new()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_filters_by_kind() {
        let bus = EventBus::new(8);
        let mut stops = bus.subscribe(&[EventKind::Stopped]);
        let mut all = bus.subscribe_all();
        let id = PipelineId::new();

        bus.publish(LifecycleEvent::Started {
            pipeline_id: id,
            attempt: 1,
            timestamp: Utc::now(),
        });
        bus.publish(stopped(id));

        let event = stops.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::Stopped);
        assert!(stops.try_recv().is_none());

        assert_eq!(all.recv().await.unwrap().kind(), EventKind::Started);
        assert_eq!(all.recv().await.unwrap().kind(), EventKind::Stopped);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut subscription = bus.subscribe_all();
        let ids: Vec<_> = (0..5).map(|_| PipelineId::new()).collect();
        for id in &ids {
            bus.publish(stopped(*id));
        }

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.pipeline_id(), ids[3]);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = EventBus::new(4);
        let mut subscription = bus.subscribe_all();
        drop(bus);
        assert!(subscription.recv().await.is_none());
    }
}
