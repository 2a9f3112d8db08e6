//! The seam between the bridge and the external pub/sub broker.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::*;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use crate::error::{BrokerErrorKind, Error};

/// A message received on a subscribed subject.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Messages from an active subscription. The stream ends when the broker connection is
/// lost.
pub type InboundStream = BoxStream<'static, InboundMessage>;

#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// Opens a fresh subscription to every pattern.
    async fn subscribe(&self, patterns: &[String]) -> Result<InboundStream, Error>;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), Error>;
}

/// Redis pub/sub broker: `PSUBSCRIBE` for inbound subjects, `PUBLISH` for outbound.
pub struct RedisBroker {
    client: redis::Client,
    publisher: OnceCell<ConnectionManager>,
}

impl RedisBroker {
    /// Parses the broker URL. Does not connect.
    pub fn open(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            publisher: OnceCell::new(),
        })
    }

    async fn publisher(&self) -> Result<ConnectionManager, Error> {
        let manager = self
            .publisher
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|e| Error::broker(BrokerErrorKind::Connection, e))?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl BrokerClient for RedisBroker {
    async fn subscribe(&self, patterns: &[String]) -> Result<InboundStream, Error> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::broker(BrokerErrorKind::Connection, e))?;

        for pattern in patterns {
            pubsub
                .psubscribe(pattern)
                .await
                .map_err(|e| Error::broker(BrokerErrorKind::Subscribe, e))?;
            debug!("Subscribed to broker pattern {pattern}");
        }

        let stream = pubsub.into_on_message().map(|msg| InboundMessage {
            subject: msg.get_channel_name().to_string(),
            payload: msg.get_payload_bytes().to_vec(),
        });

        Ok(stream.boxed())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), Error> {
        let mut conn = self.publisher().await?;
        let _receivers: i64 = conn
            .publish(subject, payload)
            .await
            .map_err(|e| Error::broker(BrokerErrorKind::Publish, e))?;
        Ok(())
    }
}
