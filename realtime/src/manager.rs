use crate::connection::{Connection, ConnectionId, ConnectionRegistry, UserId};
use crate::error::{Error, TransportErrorKind};
use crate::message::ServerFrame;
use crate::transport::FrameSink;
use events::{AccessLevel, Event};
use log::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use utoipa::ToSchema;

/// Tunables for per-connection queues and liveness.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub outbound_queue_size: usize,
    pub ping_period: Duration,
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            outbound_queue_size: 256,
            ping_period: Duration::from_secs(54),
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ManagerStats {
    pub connections: usize,
    pub per_level: BTreeMap<String, usize>,
    pub events_broadcast: u64,
    pub events_delivered: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    events_broadcast: AtomicU64,
    events_delivered: AtomicU64,
    evictions: AtomicU64,
}

/// Owns all live push connections and fans events out to them.
///
/// Every connection gets its own bounded queue and writer task. `broadcast` never waits
/// on a connection: a connection whose queue is full or closed is evicted instead.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    counters: Arc<Counters>,
    config: ManagerConfig,
    root: CancellationToken,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            counters: Arc::new(Counters::default()),
            config,
            root: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a new connection and spawn its writer. Must be called from within a
    /// tokio runtime.
    pub fn register<S: FrameSink>(
        &self,
        sink: S,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> ConnectionHandle {
        let (sender, receiver) = mpsc::channel(self.config.outbound_queue_size.max(1));
        let connection = Arc::new(Connection::new(
            user_id,
            access_level,
            sender,
            self.root.child_token(),
        ));
        self.registry.insert(connection.clone());

        info!(
            "Registered connection {} for {} at level {}",
            connection.id, connection.user_id, connection.access_level
        );

        tokio::spawn(run_writer(
            connection.clone(),
            receiver,
            sink,
            self.registry.clone(),
            self.config.clone(),
        ));

        ConnectionHandle {
            connection,
            registry: self.registry.clone(),
            counters: self.counters.clone(),
        }
    }

    /// Unregister a connection by ID. Safe to call any number of times.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.registry.remove(connection_id).is_some() {
            info!("Unregistered connection {connection_id}");
        }
    }

    /// Deliver `event` to every eligible connection without blocking.
    pub fn broadcast(&self, event: &Event) -> BroadcastOutcome {
        self.counters.events_broadcast.fetch_add(1, Ordering::Relaxed);

        let frame: Arc<str> = match serde_json::to_string(&ServerFrame::from_event(event)) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize event {}: {e}", event.id());
                return BroadcastOutcome::default();
            }
        };

        let mut outcome = BroadcastOutcome::default();
        let mut to_evict: Vec<ConnectionId> = Vec::new();

        let mut deliver = |connection: &Connection| {
            if !connection.accepts(event) {
                return;
            }
            match connection.sender.try_send(frame.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Outbound queue full for connection {}, evicting",
                        connection.id
                    );
                    to_evict.push(connection.id.clone());
                }
                Err(TrySendError::Closed(_)) => to_evict.push(connection.id.clone()),
            }
        };

        match event.target_user_id() {
            Some(user_id) => self.registry.for_user(user_id, &mut deliver),
            None => self.registry.for_each(&mut deliver),
        }

        // Shard locks are released by now.
        for id in to_evict {
            if self.registry.remove(&id).is_some() {
                outcome.evicted += 1;
            }
        }

        self.counters
            .events_delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.counters
            .evictions
            .fetch_add(outcome.evicted as u64, Ordering::Relaxed);

        trace!(
            "Broadcast {} ({}) delivered to {}, evicted {}",
            event.id(),
            event.event_type(),
            outcome.delivered,
            outcome.evicted
        );

        outcome
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> ManagerStats {
        let mut per_level: BTreeMap<String, usize> = AccessLevel::ALL
            .iter()
            .map(|level| (level.to_string(), 0))
            .collect();
        let mut connections = 0;
        self.registry.for_each(|connection| {
            connections += 1;
            *per_level
                .entry(connection.access_level.to_string())
                .or_default() += 1;
        });

        ManagerStats {
            connections,
            per_level,
            events_broadcast: self.counters.events_broadcast.load(Ordering::Relaxed),
            events_delivered: self.counters.events_delivered.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Cancels every connection and empties the registry.
    pub fn stop(&self) {
        info!("Stopping realtime manager with {} connections", self.registry.len());
        self.root.cancel();
        self.registry.clear();
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

/// Handle held by a transport's read loop for the connection it serves.
#[derive(Clone)]
pub struct ConnectionHandle {
    connection: Arc<Connection>,
    registry: Arc<ConnectionRegistry>,
    counters: Arc<Counters>,
}

impl ConnectionHandle {
    pub fn id(&self) -> &ConnectionId {
        &self.connection.id
    }

    pub fn user_id(&self) -> &str {
        &self.connection.user_id
    }

    pub fn access_level(&self) -> AccessLevel {
        self.connection.access_level
    }

    /// Queue a direct reply. It shares the connection's queue so it is ordered with
    /// broadcast frames. A full queue evicts the connection, as in `broadcast`.
    pub fn send_frame(&self, frame: &ServerFrame) -> Result<(), Error> {
        let json: Arc<str> = serde_json::to_string(frame)?.into();
        match self.connection.sender.try_send(json) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for connection {}, evicting",
                    self.connection.id
                );
                self.evict();
                Err(Error::transport(TransportErrorKind::QueueFull))
            }
            Err(TrySendError::Closed(_)) => {
                self.evict();
                Err(Error::transport(TransportErrorKind::Closed))
            }
        }
    }

    pub fn mark_alive(&self) {
        self.connection.mark_alive();
    }

    pub fn subscribe(&self, channel: &str) -> bool {
        self.connection.subscribe(channel)
    }

    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.connection.unsubscribe(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        self.connection.channels()
    }

    /// Resolves once the connection has been unregistered, evicted or stopped.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.connection.cancel.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.cancel.is_cancelled()
    }

    /// Unregister this connection. Idempotent.
    pub fn close(&self) {
        if self.registry.remove(&self.connection.id).is_some() {
            info!("Unregistered connection {}", self.connection.id);
        }
    }

    fn evict(&self) {
        if self.registry.remove(&self.connection.id).is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

enum WriteOutcome {
    Written,
    Failed(Error),
    TimedOut,
    Cancelled,
}

/// Runs one sink write, bounded by `write_timeout` and abandoned on cancellation.
async fn write_frame<F>(connection: &Connection, write_timeout: Duration, write: F) -> WriteOutcome
where
    F: std::future::Future<Output = Result<(), Error>>,
{
    tokio::select! {
        _ = connection.cancel.cancelled() => WriteOutcome::Cancelled,
        result = tokio::time::timeout(write_timeout, write) => match result {
            Ok(Ok(())) => WriteOutcome::Written,
            Ok(Err(e)) => WriteOutcome::Failed(e),
            Err(_) => WriteOutcome::TimedOut,
        },
    }
}

/// Drains one connection's queue onto its sink until cancelled or the sink fails.
async fn run_writer<S: FrameSink>(
    connection: Arc<Connection>,
    mut receiver: Receiver<Arc<str>>,
    mut sink: S,
    registry: Arc<ConnectionRegistry>,
    config: ManagerConfig,
) {
    let start = tokio::time::Instant::now() + config.ping_period;
    let mut ping = tokio::time::interval_at(start, config.ping_period);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let outcome = tokio::select! {
            biased;

            _ = connection.cancel.cancelled() => break,

            frame = receiver.recv() => {
                let Some(frame) = frame else { break };
                write_frame(&connection, config.write_timeout, sink.send_text(frame)).await
            }

            _ = ping.tick() => {
                if connection.idle_for() > config.pong_timeout {
                    warn!(
                        "Connection {} unresponsive for {:?}, disconnecting",
                        connection.id,
                        connection.idle_for()
                    );
                    break;
                }
                write_frame(&connection, config.write_timeout, sink.send_ping()).await
            }
        };

        match outcome {
            WriteOutcome::Written => {}
            WriteOutcome::Failed(e) => {
                debug!("Write to connection {} failed: {e}", connection.id);
                break;
            }
            WriteOutcome::TimedOut => {
                warn!("Write to connection {} timed out", connection.id);
                break;
            }
            WriteOutcome::Cancelled => break,
        }
    }

    receiver.close();
    let _ = tokio::time::timeout(config.write_timeout, sink.close()).await;
    if registry.remove(&connection.id).is_some() {
        debug!("Writer for connection {} exited", connection.id);
    }
}
