//! Error types for the `realtime` crate.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised while dispatching events or talking to the external broker.
/// Callers above this crate only inspect `error_kind`; the original cause is kept in
/// `source` for logging.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: RealtimeErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum RealtimeErrorKind {
    // The connection's queue is full or its writer has gone away
    Transport(TransportErrorKind),
    // Broker connection, subscription or publish failures
    Broker(BrokerErrorKind),
    // An event or frame could not be encoded or decoded
    Serialization,
    // Startup misconfiguration, e.g. an empty route table or a bad broker URL
    Config(String),
}

#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    QueueFull,
    Closed,
    WriteTimeout,
    Io,
}

#[derive(Debug, PartialEq)]
pub enum BrokerErrorKind {
    Connection,
    Subscribe,
    Publish,
}

impl Error {
    pub fn transport(kind: TransportErrorKind) -> Self {
        Error {
            source: None,
            error_kind: RealtimeErrorKind::Transport(kind),
        }
    }

    /// A socket-level write failure reported by a transport.
    pub fn io<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: RealtimeErrorKind::Transport(TransportErrorKind::Io),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: RealtimeErrorKind::Config(message.into()),
        }
    }

    pub fn broker<E>(kind: BrokerErrorKind, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: RealtimeErrorKind::Broker(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Realtime Error: {:?}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: RealtimeErrorKind::Serialization,
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let kind = if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() {
            BrokerErrorKind::Connection
        } else if err.kind() == redis::ErrorKind::InvalidClientConfig {
            return Error {
                error_kind: RealtimeErrorKind::Config(err.to_string()),
                source: Some(Box::new(err)),
            };
        } else {
            BrokerErrorKind::Subscribe
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: RealtimeErrorKind::Broker(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_errors_map_to_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert_eq!(err.error_kind, RealtimeErrorKind::Serialization);
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_bad_redis_url_is_a_config_error() {
        let err: Error = redis::Client::open("not a url").unwrap_err().into();
        assert!(matches!(err.error_kind, RealtimeErrorKind::Config(_)));
    }
}
