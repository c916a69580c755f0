//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::event::RuntimeEvent;
use crate::subscriber::{EventSubscriber, SubscriberId, SubscriberRegistry};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// Clones share the same broadcast channel and the same synchronous
/// subscriber registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<RuntimeEvent>>,
    registry: Arc<SubscriberRegistry>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(SubscriberRegistry::new()),
            capacity,
        }
    }

    /// Publish an event.
    ///
    /// Synchronous subscribers are notified before this returns. Returns
    /// the number of async receivers that were sent the event.
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "Publishing event");

        self.registry.notify(&event);

        // No receivers is fine.
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all events asynchronously.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), None)
    }

    /// Subscribe to events concerning one application.
    #[must_use]
    pub fn subscribe_app(&self, app_id: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), Some(app_id.into()))
    }

    /// Register a synchronous subscriber.
    pub fn register(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        self.registry.register(subscriber)
    }

    /// Unregister a synchronous subscriber.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.registry.unregister(id)
    }

    /// Number of active subscribers (async and synchronous).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .receiver_count()
            .saturating_add(self.registry.len())
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<RuntimeEvent>>,
    app_filter: Option<String>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<Arc<RuntimeEvent>>, app_filter: Option<String>) -> Self {
        Self {
            receiver,
            app_filter,
        }
    }

    fn matches(&self, event: &RuntimeEvent) -> bool {
        match &self.app_filter {
            None => true,
            Some(app_id) => event.app_id() == Some(app_id.as_str()),
        }
    }

    /// Receive the next event. Returns `None` once the bus is closed.
    ///
    /// A lagging receiver logs how many events it missed and continues.
    pub async fn recv(&mut self) -> Option<Arc<RuntimeEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {},
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<RuntimeEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => {},
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
