//! The write half of a push connection, as seen by the dispatcher.
//!
//! The web layer implements [`FrameSink`] for the outgoing half of a WebSocket. Tests use
//! `ChannelSink`, which records what was written; it is only built for this crate's tests
//! and for dependents enabling the `test-util` feature.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Error;
#[cfg(any(test, feature = "test-util"))]
pub use channel::{ChannelSink, SinkItem};

#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Writes one serialized text frame.
    async fn send_text(&mut self, text: Arc<str>) -> Result<(), Error>;

    /// Writes a transport-level keep-alive ping.
    async fn send_ping(&mut self) -> Result<(), Error>;

    /// Sends a close frame if the transport has one. Errors are ignored by the caller.
    async fn close(&mut self) -> Result<(), Error>;
}

#[cfg(any(test, feature = "test-util"))]
mod channel {
    use super::*;
    use crate::error::TransportErrorKind;
    use tokio::sync::mpsc;

    /// What a [`ChannelSink`] observed being written.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SinkItem {
        Text(Arc<str>),
        Ping,
        Close,
    }

    /// A [`FrameSink`] that forwards writes into an unbounded channel.
    pub struct ChannelSink {
        sender: mpsc::UnboundedSender<SinkItem>,
    }

    impl ChannelSink {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkItem>) {
            let (sender, receiver) = mpsc::unbounded_channel();
            (Self { sender }, receiver)
        }

        fn push(&self, item: SinkItem) -> Result<(), Error> {
            self.sender
                .send(item)
                .map_err(|_| Error::transport(TransportErrorKind::Closed))
        }
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_text(&mut self, text: Arc<str>) -> Result<(), Error> {
            self.push(SinkItem::Text(text))
        }

        async fn send_ping(&mut self) -> Result<(), Error> {
            self.push(SinkItem::Ping)
        }

        async fn close(&mut self) -> Result<(), Error> {
            self.push(SinkItem::Close)
        }
    }
}
