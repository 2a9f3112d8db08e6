use uuid::Uuid;

// Stream catalog (read-only from this service)
pub mod streams;

// Capability sessions and chat
pub mod stream_chat_messages;
pub mod stream_sessions;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
