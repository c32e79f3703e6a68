//! Fan-out of store changes to watch subscriptions.
//!
//! The store publishes one [`StoreEvent`] per mutation while holding its
//! write lock, so every receiver observes changes in commit order. A
//! receiver that falls more than `capacity` events behind loses the oldest
//! ones and is told how many it missed.

use tokio::sync::broadcast;

use super::{ChangeEvent, StoreEvent};

/// Broadcast bus for [`StoreEvent`]s, one receiver per subscription.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a bus retaining up to `capacity` undelivered events per
    /// receiver. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Per-receiver backlog limit.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Announces a change to `collection`, returning how many receivers
    /// were attached. Without receivers the change is dropped.
    pub fn publish(&self, collection: &str, change: ChangeEvent) -> usize {
        let event = StoreEvent {
            collection: collection.to_string(),
            change,
        };
        self.sender.send(event).unwrap_or(0)
    }

    /// Attaches a receiver that sees every change published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Number of attached receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ResourceObject;

    fn added(name: &str) -> ChangeEvent {
        ChangeEvent::Added(ResourceObject::new(name, None))
    }

    #[test]
    fn nobody_listening() {
        let bus = EventBus::new(0);
        assert_eq!(bus.capacity(), 1);
        assert_eq!(bus.publish("widgets", added("a")), 0);
    }

    #[tokio::test]
    async fn receivers_see_collection_and_change() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        assert_eq!(bus.publish("gadgets", added("g")), 2);

        for rx in [&mut first, &mut second] {
            let Ok(event) = rx.recv().await else {
                panic!("event not delivered");
            };
            assert_eq!(event.collection, "gadgets");
            assert_eq!(event.change.object().name(), "g");
        }

        drop(first);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[tokio::test]
    async fn slow_receiver_is_told_what_it_missed() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe();

        bus.publish("widgets", added("a"));
        bus.publish("widgets", added("b"));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        let Ok(event) = rx.recv().await else {
            panic!("newest event must survive");
        };
        assert_eq!(event.change.object().name(), "b");
    }
}
