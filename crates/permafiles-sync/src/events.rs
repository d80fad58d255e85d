//! Event bus
//!
//! Fans every [`SyncEvent`] out to the registered observers, synchronously
//! and in emission order.

use std::sync::{Arc, RwLock};

use permafiles_core::ports::{IEventObserver, SyncEvent};
use tokio::sync::mpsc;
use tracing::trace;

/// Shared list of observers. Cloning yields a handle to the same list.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Arc<RwLock<Vec<Arc<dyn IEventObserver>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for all future events
    pub fn subscribe(&self, observer: Arc<dyn IEventObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// Register a channel observer and return its receiving end
    pub fn channel(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (observer, rx) = ChannelObserver::new();
        self.subscribe(Arc::new(observer));
        rx
    }

    /// Deliver `event` to every observer
    pub fn emit(&self, event: SyncEvent) {
        trace!(event = event.name(), "emitting event");
        // Clone the list so observers may subscribe from inside a callback.
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };
        for observer in observers {
            observer.on_event(&event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Observer that forwards events into an unbounded channel
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl IEventObserver for ChannelObserver {
    fn on_event(&self, event: &SyncEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use permafiles_core::domain::TransferDirection;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl IEventObserver for Recorder {
        fn on_event(&self, event: &SyncEvent) {
            self.0.lock().unwrap().push(event.name());
        }
    }

    #[test]
    fn test_events_reach_every_observer_in_order() {
        let bus = EventBus::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        bus.subscribe(a.clone());
        bus.subscribe(b.clone());

        bus.emit(SyncEvent::QueueDrained {
            direction: TransferDirection::Upload,
        });
        bus.emit(SyncEvent::QueueDrained {
            direction: TransferDirection::Download,
        });

        assert_eq!(*a.0.lock().unwrap(), vec!["queue_drained", "queue_drained"]);
        assert_eq!(b.0.lock().unwrap().len(), 2);
        assert_eq!(bus.observer_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let bus = EventBus::new();
        let mut rx = bus.channel();
        bus.emit(SyncEvent::QueueDrained {
            direction: TransferDirection::Upload,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            SyncEvent::QueueDrained {
                direction: TransferDirection::Upload
            }
        );
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let bus = EventBus::new();
        drop(bus.channel());
        bus.emit(SyncEvent::QueueDrained {
            direction: TransferDirection::Upload,
        });
    }
}
