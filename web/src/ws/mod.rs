//! WebSocket transport for push connections.
//!
//! The core push infrastructure (Manager, ConnectionRegistry, frames) lives in the
//! `realtime` crate. This module only adapts an axum socket to it: the write half
//! becomes a [`realtime::transport::FrameSink`] owned by the connection's writer task
//! and the read half is driven by [`handler::run_connection`].

pub(crate) mod handler;
pub(crate) mod sink;
