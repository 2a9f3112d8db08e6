use dashmap::DashMap;
use events::{clears, AccessLevel, Event};
use log::*;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type UserId = String;

/// User id given to connections that presented no credentials.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live push connection. The access level is fixed at registration.
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub access_level: AccessLevel,
    pub(crate) sender: Sender<Arc<str>>,
    pub(crate) cancel: CancellationToken,
    // Empty means "every channel".
    channels: RwLock<HashSet<String>>,
    opened_at: Instant,
    last_seen_ms: AtomicU64,
}

impl Connection {
    pub(crate) fn new(
        user_id: UserId,
        access_level: AccessLevel,
        sender: Sender<Arc<str>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            access_level,
            sender,
            cancel,
            channels: RwLock::new(HashSet::new()),
            opened_at: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        }
    }

    /// Whether this connection should receive `event`.
    pub fn accepts(&self, event: &Event) -> bool {
        if !clears(self.access_level, event.access_level()) {
            return false;
        }

        if let Some(target) = event.target_user_id() {
            if target != self.user_id {
                return false;
            }
        }

        let channels = self.channels.read();
        channels.is_empty() || channels.contains(event.event_type().as_str())
    }

    pub fn subscribe(&self, channel: &str) -> bool {
        self.channels.write().insert(channel.to_string())
    }

    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.channels.write().remove(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.read().iter().cloned().collect();
        channels.sort();
        channels
    }

    pub fn mark_alive(&self) {
        let elapsed = self.opened_at.elapsed().as_millis() as u64;
        self.last_seen_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last inbound frame (or since registration).
    pub fn idle_for(&self) -> Duration {
        let now = self.opened_at.elapsed().as_millis() as u64;
        let last = self.last_seen_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}

/// Connection registry with dual indices for O(1) lookups
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Secondary index: lookup by user_id for targeted events - O(1)
    user_index: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    pub fn insert(&self, connection: Arc<Connection>) {
        let id = connection.id.clone();
        let user_id = connection.user_id.clone();

        self.connections.insert(id.clone(), connection);
        self.user_index.entry(user_id).or_default().insert(id);
    }

    /// Removes a connection and cancels its writer. Returns the removed connection the
    /// first time, `None` on every later call.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(connection_id)?;
        connection.cancel.cancel();

        if let Some(mut entry) = self.user_index.get_mut(&connection.user_id) {
            entry.remove(connection_id);

            if entry.is_empty() {
                drop(entry); // Release lock before removal
                self.user_index
                    .remove_if(&connection.user_id, |_, ids| ids.is_empty());
            }
        }

        Some(connection)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Visits every connection under shard read locks. `visit` must not block.
    pub fn for_each(&self, mut visit: impl FnMut(&Connection)) {
        for entry in self.connections.iter() {
            visit(entry.value());
        }
    }

    /// Visits the connections of one user.
    pub fn for_user(&self, user_id: &str, mut visit: impl FnMut(&Connection)) {
        // Copy the ids out so no user_index guard is held while reading connections.
        let ids: Vec<ConnectionId> = match self.user_index.get(user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return,
        };

        for id in ids {
            if let Some(connection) = self.connections.get(&id) {
                visit(connection.value());
            }
        }
    }

    /// Removes and cancels every connection.
    pub fn clear(&self) {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
        self.user_index.clear();
        debug!("Connection registry cleared");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
