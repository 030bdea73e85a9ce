use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use webpilot_core_types::CoreError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Single-slot publish channel: at most one subscriber at a time, and
/// subscribing replaces any prior subscription.
///
/// Publishing with no subscriber attached drops the event; orchestration
/// progress must never block on an absent observer.
pub struct SingleSlotBus<E>
where
    E: Event,
{
    slot: Mutex<Option<mpsc::UnboundedSender<E>>>,
}

impl<E> SingleSlotBus<E>
where
    E: Event,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
        })
    }

    /// Attach a subscriber, detaching whoever held the slot before.
    /// The previous receiver observes channel closure.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.slot.lock();
        if slot.replace(tx).is_some() {
            tracing::debug!("event subscriber replaced");
        }
        rx
    }

    /// Detach the current subscriber, if any.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Whether a subscriber is currently attached.
    pub fn has_subscriber(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Deliver an event to the current subscriber.
    ///
    /// A send failure means the receiver was dropped without unsubscribing;
    /// the slot is emptied so later publishes become cheap no-ops.
    pub fn publish(&self, event: E) -> Result<(), CoreError> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    slot.take();
                    return Err(CoreError::new("event subscriber dropped its receiver"));
                }
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscriber_is_noop() {
        let bus: Arc<SingleSlotBus<u32>> = SingleSlotBus::new();
        assert!(bus.publish(1).is_ok());
        assert!(!bus.has_subscriber());
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus: Arc<SingleSlotBus<u32>> = SingleSlotBus::new();
        let mut rx = bus.subscribe();

        for n in 0..5 {
            bus.publish(n).unwrap();
        }
        for n in 0..5 {
            assert_eq!(rx.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn test_subscribe_replaces_previous_subscriber() {
        let bus: Arc<SingleSlotBus<u32>> = SingleSlotBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(7).unwrap();

        // The first receiver's channel is closed, the second gets the event.
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_clear_detaches_subscriber() {
        let bus: Arc<SingleSlotBus<u32>> = SingleSlotBus::new();
        let mut rx = bus.subscribe();
        bus.clear();

        assert!(bus.publish(1).is_ok());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_empties_slot() {
        let bus: Arc<SingleSlotBus<u32>> = SingleSlotBus::new();
        let rx = bus.subscribe();
        drop(rx);

        assert!(bus.publish(1).is_err());
        assert!(!bus.has_subscriber());
        // Second publish is a silent no-op again.
        assert!(bus.publish(2).is_ok());
    }
}
