//! Real-time push infrastructure: connection registry, clearance-filtered fan-out and
//! the broker bridge.
//!
//! # Architecture
//!
//! - **Dual-index registry**: O(1) lookups for both connection management and
//!   user-targeted routing via separate DashMap indices.
//! - **Bounded per-connection queues**: every connection owns a bounded queue and a
//!   writer task. Broadcasting never waits on a slow consumer; a full queue evicts it.
//! - **Clearance filtering**: a connection's access level is fixed at registration and
//!   compared against each event's required level before enqueueing.
//! - **Ephemeral delivery**: a viewer that is offline misses the event. There is no
//!   replay.
//!
//! # Message Flow
//!
//! 1. The web layer upgrades `/ws/realtime`, resolves the caller's clearance and calls
//!    [`Manager::register`] with the socket's write half
//! 2. Producers (HTTP handlers, the chat relay, the [`bridge::Bridge`] and the
//!    in-process [`events::EventPublisher`]) call [`Manager::broadcast`]
//! 3. The manager serializes the event once and enqueues it on every eligible queue
//! 4. Each writer drains its queue onto the socket, pinging idle clients
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and the per-connection filter state
//! - `manager`: registration, fan-out, eviction and per-connection writers
//! - `message`: server and client wire frames
//! - `transport`: the `FrameSink` seam implemented by the web layer
//! - `bridge`: external broker subscription, routing and reconnects
//! - `event_handler`: adapter from the in-process event bus

pub mod bridge;
pub mod connection;
pub mod error;
pub mod event_handler;
pub mod manager;
pub mod message;
pub mod transport;

pub use connection::{ConnectionId, ANONYMOUS_USER};
pub use error::Error;
pub use event_handler::RealtimeEventHandler;
pub use manager::{BroadcastOutcome, ConnectionHandle, Manager, ManagerConfig, ManagerStats};
