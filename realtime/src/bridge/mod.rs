//! Bridges an external pub/sub broker into the [`Manager`].
//!
//! A supervisor task owns the broker subscription. Each inbound message is resolved
//! against the [`RouteTable`], converted to an [`Event`] and broadcast. When the
//! subscription fails or ends, the supervisor waits with exponential backoff and
//! subscribes again; in-process broadcasting is unaffected while it does.

pub mod backoff;
pub mod broker;
pub mod routes;

pub use backoff::ReconnectPolicy;
pub use broker::{BrokerClient, InboundMessage, InboundStream, RedisBroker};
pub use routes::{Route, RouteTable};

use crate::error::{Error, RealtimeErrorKind};
use crate::Manager;
use events::{priority_from_payload, AccessLevel, Event, EventType};
use futures::StreamExt;
use log::*;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BridgeStats {
    pub connected: bool,
    pub reconnects: u64,
    pub received: u64,
    pub dropped_malformed: u64,
    pub broadcast: u64,
    pub subscriptions: usize,
}

#[derive(Default)]
struct BridgeState {
    connected: AtomicBool,
    reconnects: AtomicU64,
    received: AtomicU64,
    dropped_malformed: AtomicU64,
    broadcast: AtomicU64,
    subscriptions: AtomicUsize,
}

pub struct Bridge {
    broker: Arc<dyn BrokerClient>,
    manager: Arc<Manager>,
    routes: Arc<RouteTable>,
    policy: ReconnectPolicy,
    state: Arc<BridgeState>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        manager: Arc<Manager>,
        routes: RouteTable,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            broker,
            manager,
            routes: Arc::new(routes),
            policy,
            state: Arc::new(BridgeState::default()),
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
        }
    }

    /// Spawns the supervisor and returns immediately. Calling it again is a no-op.
    pub fn start(&self) -> Result<(), Error> {
        if self.routes.is_empty() {
            return Err(Error::config("bridge route table is empty"));
        }

        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            return Ok(());
        }

        let task = Supervisor {
            broker: self.broker.clone(),
            manager: self.manager.clone(),
            routes: self.routes.clone(),
            policy: self.policy.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        };
        *supervisor = Some(tokio::spawn(task.run()));

        info!(
            "Broker bridge started with {} routes",
            self.routes.routes().len()
        );
        Ok(())
    }

    /// Cancels the supervisor and waits for it to exit. The bridge cannot be restarted.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Broker bridge supervisor ended abnormally: {e}");
            }
        }
        self.state.connected.store(false, Ordering::Relaxed);
        info!("Broker bridge stopped");
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            connected: self.state.connected.load(Ordering::Relaxed),
            reconnects: self.state.reconnects.load(Ordering::Relaxed),
            received: self.state.received.load(Ordering::Relaxed),
            dropped_malformed: self.state.dropped_malformed.load(Ordering::Relaxed),
            broadcast: self.state.broadcast.load(Ordering::Relaxed),
            subscriptions: self.state.subscriptions.load(Ordering::Relaxed),
        }
    }

    /// Publishes the full event envelope on `subject` so other instances can fan it out.
    pub async fn publish(&self, subject: &str, event: &Event) -> Result<(), Error> {
        let payload = serde_json::to_vec(event)?;
        self.broker.publish(subject, payload).await
    }
}

struct Supervisor {
    broker: Arc<dyn BrokerClient>,
    manager: Arc<Manager>,
    routes: Arc<RouteTable>,
    policy: ReconnectPolicy,
    state: Arc<BridgeState>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self) {
        let patterns = self.routes.subscription_patterns();
        let mut attempts: u32 = 0;

        loop {
            let subscribed = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.broker.subscribe(&patterns) => result,
            };

            match subscribed {
                Ok(stream) => {
                    let connected_at = Instant::now();
                    self.state.connected.store(true, Ordering::Relaxed);
                    self.state
                        .subscriptions
                        .store(patterns.len(), Ordering::Relaxed);
                    info!("Broker bridge subscribed to {} patterns", patterns.len());

                    let cancelled = self.consume(stream).await;

                    self.state.connected.store(false, Ordering::Relaxed);
                    self.state.subscriptions.store(0, Ordering::Relaxed);
                    if cancelled {
                        break;
                    }

                    let uptime = connected_at.elapsed();
                    if self.policy.is_stable(uptime) {
                        attempts = 0;
                    }
                    warn!("Broker subscription ended after {uptime:?}");
                }
                Err(e) => warn!("Broker subscription failed: {e}"),
            }

            if !self.policy.should_retry(attempts) {
                error!(
                    "Broker bridge giving up after {attempts} reconnect attempts; live events from the broker are disabled"
                );
                break;
            }

            let delay = self.policy.exponential_delay(attempts);
            attempts += 1;
            self.state.reconnects.fetch_add(1, Ordering::Relaxed);
            debug!("Reconnecting to broker in {delay:?} (attempt {attempts})");

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.connected.store(false, Ordering::Relaxed);
    }

    /// Forwards messages until the stream ends (`false`) or the bridge is cancelled
    /// (`true`).
    async fn consume(&self, mut stream: InboundStream) -> bool {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return true,
                message = stream.next() => match message {
                    Some(message) => self.forward(message),
                    None => return false,
                },
            }
        }
    }

    fn forward(&self, message: InboundMessage) {
        self.state.received.fetch_add(1, Ordering::Relaxed);

        match event_from_message(&self.routes, &message) {
            Ok(event) => {
                self.manager.broadcast(&event);
                self.state.broadcast.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.state.dropped_malformed.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping malformed message on {}: {e}", message.subject);
            }
        }
    }
}

/// Converts an inbound broker message into an event.
///
/// A payload that is a full event envelope (`id`, `type` and `payload`) is taken as is;
/// any other JSON object becomes the payload of an event of the route's type. Either way
/// the event requires at least the route's clearance, or `Admin` for unrouted subjects.
pub fn event_from_message(routes: &RouteTable, message: &InboundMessage) -> Result<Event, Error> {
    let value: Value = serde_json::from_slice(&message.payload)?;
    let route = routes.resolve(&message.subject);
    let route_level = route.map(|r| r.access_level).unwrap_or(AccessLevel::Admin);

    let Value::Object(fields) = &value else {
        return Err(Error {
            source: None,
            error_kind: RealtimeErrorKind::Serialization,
        });
    };

    let is_envelope = ["id", "type", "payload"]
        .iter()
        .all(|key| fields.contains_key(*key));
    if is_envelope {
        let event: Event = serde_json::from_value(value)?;
        return Ok(event.with_minimum_level(route_level));
    }

    let event_type = route
        .map(|r| r.event_type.clone())
        .unwrap_or_else(|| EventType::Other(message.subject.clone()));
    let priority = priority_from_payload(&value);

    Ok(Event::builder(event_type)
        .source(message.subject.clone())
        .payload(value)
        .access_level(route_level)
        .priority(priority)
        .build())
}
