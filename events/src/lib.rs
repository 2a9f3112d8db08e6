//! Event model for the real-time backbone.
//!
//! This crate holds the vocabulary shared by every producer and consumer of live data:
//!
//! - **AccessLevel**: ordered clearance tiers and the subscription-tier table
//! - **Event**: the immutable envelope that is fanned out to connections
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! It has no dependencies on internal crates so that the dispatcher, the domain layer
//! and the web layer can all depend on it without cycles.

use async_trait::async_trait;
use std::sync::Arc;

pub mod access;
pub mod event;

pub use access::{clears, parse_access_level, AccessLevel, SubscriptionTier};
pub use event::{
    priority_from_payload, Event, EventBuilder, EventType, DEFAULT_PRIORITY, MAX_PRIORITY,
    MIN_PRIORITY,
};

/// Trait for handling published events.
/// Implementations perform side effects like pushing to live connections or
/// forwarding to the external broker.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Publishes events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<(String, &'static str)>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &Event) {
            self.seen
                .lock()
                .unwrap()
                .push((event.id().to_string(), self.name));
        }
    }

    #[tokio::test]
    async fn test_publish_calls_handlers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(Recorder {
                name: "first",
                seen: seen.clone(),
            }))
            .with_handler(Arc::new(Recorder {
                name: "second",
                seen: seen.clone(),
            }));

        publisher
            .publish(Event::builder(EventType::Alert).id("evt-1").build())
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("evt-1".to_string(), "first"),
                ("evt-1".to_string(), "second")
            ]
        );
    }

    #[test]
    fn test_with_handler_leaves_original_publisher_untouched() {
        let base = EventPublisher::default();
        let extended = base.clone().with_handler(Arc::new(Recorder {
            name: "only",
            seen: Arc::new(Mutex::new(Vec::new())),
        }));

        assert_eq!(base.handler_count(), 0);
        assert_eq!(extended.handler_count(), 1);
    }
}
