//! Read-only lookup of the streams that sessions and chat are scoped to.

use crate::error::{EntityErrorKind, Error};
use crate::streams::Model;
use crate::tier::StreamType;
use async_trait::async_trait;
use dashmap::DashMap;
use entity_api::stream;
use events::AccessLevel;
use log::*;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Returns the stream or an `Entity(NotFound)` error.
    async fn find(&self, stream_id: &str) -> Result<Model, Error>;

    /// Clearance needed to receive data scoped to `stream_id`. Lookup failures,
    /// including a missing stream, are returned rather than mapped to a level.
    async fn required_level(&self, stream_id: &str) -> Result<AccessLevel, Error> {
        let stream = self.find(stream_id).await.inspect_err(|err| {
            if !err.is_not_found() {
                warn!("Stream catalog lookup for {stream_id} failed: {err:?}");
            }
        })?;
        Ok(StreamType::from(stream.stream_type.as_str()).required_level())
    }
}

pub struct DbStreamCatalog {
    db: Arc<DatabaseConnection>,
}

impl DbStreamCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StreamCatalog for DbStreamCatalog {
    async fn find(&self, stream_id: &str) -> Result<Model, Error> {
        Ok(stream::find_by_id(&self.db, stream_id).await?)
    }
}

/// Catalog held in memory, used for local development and tests.
#[derive(Default)]
pub struct MemoryStreamCatalog {
    streams: DashMap<String, Model>,
}

impl MemoryStreamCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, stream: Model) -> Self {
        self.streams.insert(stream.id.clone(), stream);
        self
    }
}

#[async_trait]
impl StreamCatalog for MemoryStreamCatalog {
    async fn find(&self, stream_id: &str) -> Result<Model, Error> {
        self.streams
            .get(stream_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))
    }
}
