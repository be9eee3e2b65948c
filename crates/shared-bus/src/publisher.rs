//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{EngineEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription, SubscriptionTracker};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Outbound side of the bus, as seen by the subsystems.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns the number of receivers the event was handed to, before
    /// filtering. Zero means nobody is listening.
    async fn publish(&self, event: EngineEvent) -> usize;

    fn events_published(&self) -> u64;
}

/// Single-process bus over `tokio::sync::broadcast`.
///
/// Every subscriber sees every event; filters are applied on receive.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<EngineEvent>,
    tracker: SubscriptionTracker,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscriber before it lags.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            tracker: SubscriptionTracker::default(),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Events published after this call that pass `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(filter = %filter.label(), "Subscription opened");
        Subscription::new(self.sender.subscribe(), filter, self.tracker.clone())
    }

    /// Stream form of [`InMemoryEventBus::subscribe`]; not tracked.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    /// Open receivers, streams included.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Live subscriptions per filter label.
    #[must_use]
    pub fn subscriptions_by_topic(&self) -> HashMap<String, usize> {
        self.tracker.snapshot()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EngineEvent) -> usize {
        let (topic, source) = (event.topic(), event.source());
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let Ok(receivers) = self.sender.send(event) else {
            warn!(?topic, source, "Event dropped, nobody is subscribed");
            return 0;
        };
        debug!(?topic, source, receivers, "Event published");
        receivers
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;

    fn updated() -> EngineEvent {
        EngineEvent::BlockUpdated {
            policy_id: "p1".into(),
            block_id: "b1".into(),
            user: "did:user".into(),
        }
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish(updated()).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe(EventFilter::all());

        let receivers = bus.publish(updated()).await;

        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryEventBus::new();

        let _sub1 = bus.subscribe(EventFilter::all());
        let _sub2 = bus.subscribe(EventFilter::all());
        let _sub3 = bus.subscribe(EventFilter::topics(vec![EventTopic::WorkerTasks]));

        // Broadcast delivers to every receiver; filtering happens on receive.
        let receivers = bus.publish(updated()).await;
        assert_eq!(receivers, 3);
        assert_eq!(bus.subscriptions_by_topic().get("*"), Some(&2));
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
    }
}
