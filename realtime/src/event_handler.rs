use crate::Manager;
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;
use std::sync::Arc;

/// Forwards events published on the in-process bus to live connections.
///
/// Publishers pick the access level and, optionally, a target user. This handler only
/// routes: filtering happens in [`Manager::broadcast`].
pub struct RealtimeEventHandler {
    manager: Arc<Manager>,
}

impl RealtimeEventHandler {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for RealtimeEventHandler {
    async fn handle(&self, event: &Event) {
        let outcome = self.manager.broadcast(event);
        debug!(
            "Published {} event {} to {} connection(s)",
            event.event_type(),
            event.id(),
            outcome.delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelSink, SinkItem};
    use events::{AccessLevel, EventPublisher, EventType};

    #[tokio::test]
    async fn test_published_events_reach_connections() {
        let manager = Arc::new(Manager::default());
        let (sink, mut rx) = ChannelSink::new();
        manager.register(sink, "u".to_string(), AccessLevel::Civilian);

        let publisher =
            EventPublisher::new().with_handler(Arc::new(RealtimeEventHandler::new(manager.clone())));
        publisher
            .publish(Event::builder(EventType::StreamUpdate).id("evt-1").build())
            .await;

        match rx.recv().await {
            Some(SinkItem::Text(text)) => assert!(text.contains("\"evt-1\"")),
            other => panic!("expected a frame, got {other:?}"),
        }
    }
}
