use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use realtime::transport::FrameSink;
use std::sync::Arc;

/// The outgoing half of an upgraded socket.
pub(crate) struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    pub(crate) fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: Arc<str>) -> Result<(), realtime::Error> {
        self.inner
            .send(Message::Text(text.as_ref().into()))
            .await
            .map_err(realtime::Error::io)
    }

    async fn send_ping(&mut self) -> Result<(), realtime::Error> {
        self.inner
            .send(Message::Ping(Default::default()))
            .await
            .map_err(realtime::Error::io)
    }

    async fn close(&mut self) -> Result<(), realtime::Error> {
        self.inner
            .send(Message::Close(None))
            .await
            .map_err(realtime::Error::io)?;
        self.inner.close().await.map_err(realtime::Error::io)
    }
}
