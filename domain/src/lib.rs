//! Stream-facing domain services: capability sessions, chat and caller resolution.
//!
//! The entity modules are re-exported so that consumers of the `domain` crate do not
//! need to depend on `entity_api` directly.

pub use entity_api::{stream_chat_messages, stream_sessions, streams, Id};

pub mod chat;
pub mod error;
pub mod jwt;
pub mod session_store;
pub mod stream_catalog;
pub mod stream_session;
pub mod tier;
