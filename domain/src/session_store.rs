//! Storage for issued stream sessions.

use crate::error::Error;
use crate::stream_sessions::Model;
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use entity_api::stream_session;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Model) -> Result<(), Error>;

    async fn get(&self, session_id: Id) -> Result<Option<Model>, Error>;

    /// Returns whether a record was removed.
    async fn remove(&self, session_id: Id) -> Result<bool, Error>;

    /// Removes every session whose expiry is at or before `now`.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Id, Model>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Model) -> Result<(), Error> {
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, session_id: Id) -> Result<Option<Model>, Error> {
        Ok(self
            .sessions
            .get(&session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn remove(&self, session_id: Id) -> Result<bool, Error> {
        Ok(self.sessions.remove(&session_id).is_some())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        Ok((before - self.sessions.len()) as u64)
    }
}

pub struct DbSessionStore {
    db: Arc<DatabaseConnection>,
}

impl DbSessionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn insert(&self, session: Model) -> Result<(), Error> {
        stream_session::create(&self.db, session).await?;
        Ok(())
    }

    async fn get(&self, session_id: Id) -> Result<Option<Model>, Error> {
        match stream_session::find_by_id(&self.db, session_id).await {
            Ok(session) => Ok(Some(session)),
            Err(err) if err.error_kind == entity_api::error::EntityApiErrorKind::RecordNotFound => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, session_id: Id) -> Result<bool, Error> {
        Ok(stream_session::delete_by_id(&self.db, session_id).await? > 0)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        Ok(stream_session::delete_expired(&self.db, now).await?)
    }
}
