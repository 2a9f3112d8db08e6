//! Database queries for the stream catalog, capability sessions and chat.

pub use entity::{stream_chat_messages, stream_sessions, streams, Id};

pub mod error;
pub mod stream;
pub mod stream_chat_message;
pub mod stream_session;
