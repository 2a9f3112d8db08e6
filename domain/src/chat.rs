//! Per-stream chat relay.
//!
//! Messages are persisted through a [`ChatStore`] when one is configured and its table
//! exists. Otherwise they land in a bounded in-memory ring per stream. Listing merges
//! both sources, so a store that appears mid-run (migrations applied late) loses
//! nothing that was accepted before. Messages are only accepted for streams in the
//! catalog, and each is published as a `stream_chat` event at that stream's clearance.

use crate::error::{EntityErrorKind, Error};
use crate::stream_catalog::StreamCatalog;
use crate::{stream_chat_messages, Id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use entity_api::stream_chat_message;
use events::{AccessLevel, Event, EventPublisher, EventType};
use log::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use utoipa::ToSchema;

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 200;
/// Messages kept per stream when durable storage is unavailable.
pub const MEMORY_CAPACITY: usize = 200;
pub const DEFAULT_USERNAME: &str = "Viewer";

const CHAT_SOURCE: &str = "chat_relay";
const CHAT_PRIORITY: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[schema(value_type = String, format = Uuid)]
    pub id: Id,
    pub stream_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
}

impl From<stream_chat_messages::Model> for ChatMessage {
    fn from(model: stream_chat_messages::Model) -> Self {
        Self {
            id: model.id,
            stream_id: model.stream_id,
            user_id: model.user_id,
            username: model.username,
            message: model.message,
            timestamp: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<ChatMessage> for stream_chat_messages::Model {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            stream_id: message.stream_id,
            user_id: message.user_id,
            username: message.username,
            message: message.message,
            created_at: message.timestamp.into(),
        }
    }
}

/// Maps a requested page size onto `1..=MAX_LIMIT`, falling back to `DEFAULT_LIMIT`.
pub fn normalize_limit(limit: Option<i64>) -> u64 {
    match limit {
        Some(limit) if (1..=MAX_LIMIT as i64).contains(&limit) => limit as u64,
        _ => DEFAULT_LIMIT,
    }
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<(), Error>;

    /// Up to `limit` messages for the stream, most recent first.
    async fn recent(&self, stream_id: &str, limit: u64) -> Result<Vec<ChatMessage>, Error>;
}

pub struct DbChatStore {
    db: Arc<DatabaseConnection>,
}

impl DbChatStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for DbChatStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), Error> {
        stream_chat_message::create(&self.db, message.clone().into()).await?;
        Ok(())
    }

    async fn recent(&self, stream_id: &str, limit: u64) -> Result<Vec<ChatMessage>, Error> {
        Ok(
            stream_chat_message::find_recent_by_stream_id(&self.db, stream_id, limit)
                .await?
                .into_iter()
                .map(ChatMessage::from)
                .collect(),
        )
    }
}

pub struct ChatRelay {
    store: Option<Arc<dyn ChatStore>>,
    catalog: Arc<dyn StreamCatalog>,
    publisher: EventPublisher,
    memory: DashMap<String, VecDeque<ChatMessage>>,
    fallback_logged: AtomicBool,
}

impl ChatRelay {
    pub fn new(catalog: Arc<dyn StreamCatalog>, publisher: EventPublisher) -> Self {
        Self {
            store: None,
            catalog,
            publisher,
            memory: DashMap::new(),
            fallback_logged: AtomicBool::new(false),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn add(
        &self,
        stream_id: &str,
        user_id: &str,
        username: Option<&str>,
        message: &str,
    ) -> Result<ChatMessage, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::entity(EntityErrorKind::Invalid));
        }
        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_USERNAME);

        let access_level = self.catalog.required_level(stream_id).await?;

        let chat_message = ChatMessage {
            id: Id::new_v4(),
            stream_id: stream_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        if !self.persist(&chat_message).await? {
            self.remember(chat_message.clone());
        }

        self.publish(&chat_message, access_level).await;
        Ok(chat_message)
    }

    /// Messages for the stream in chronological order, at most `limit` of the newest.
    pub async fn list(&self, stream_id: &str, limit: Option<i64>) -> Result<Vec<ChatMessage>, Error> {
        let limit = normalize_limit(limit);

        let mut messages = match &self.store {
            Some(store) => match store.recent(stream_id, limit).await {
                Ok(mut recent) => {
                    recent.reverse();
                    recent
                }
                Err(err) if err.is_missing_relation() => {
                    self.log_fallback(&err);
                    Vec::new()
                }
                Err(err) => return Err(err),
            },
            None => Vec::new(),
        };

        if let Some(remembered) = self.memory.get(stream_id) {
            let mut seen: HashSet<Id> = messages.iter().map(|m| m.id).collect();
            messages.extend(
                remembered
                    .iter()
                    .filter(|m| seen.insert(m.id))
                    .cloned(),
            );
            messages.sort_by_key(|m| m.timestamp);
        }

        let excess = messages.len().saturating_sub(limit as usize);
        messages.drain(..excess);
        Ok(messages)
    }

    /// Returns `false` when the message must be kept in memory instead.
    async fn persist(&self, message: &ChatMessage) -> Result<bool, Error> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        match store.append(message).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_missing_relation() => {
                self.log_fallback(&err);
                Ok(false)
            }
            Err(err) => {
                warn!("Failed to persist chat message for stream {}: {err:?}", message.stream_id);
                Err(err)
            }
        }
    }

    fn remember(&self, message: ChatMessage) {
        let mut ring = self.memory.entry(message.stream_id.clone()).or_default();
        ring.push_back(message);
        while ring.len() > MEMORY_CAPACITY {
            ring.pop_front();
        }
    }

    fn log_fallback(&self, err: &Error) {
        if !self.fallback_logged.swap(true, Ordering::Relaxed) {
            warn!("Chat storage unavailable, keeping messages in memory: {err}");
        }
    }

    async fn publish(&self, message: &ChatMessage, access_level: AccessLevel) {
        let event = Event::builder(EventType::StreamChat)
            .source(CHAT_SOURCE)
            .priority(CHAT_PRIORITY)
            .access_level(access_level)
            .payload(json!({
                "streamId": message.stream_id,
                "id": message.id,
                "userId": message.user_id,
                "username": message.username,
                "message": message.message,
                "timestamp": message.timestamp,
            }))
            .build();

        self.publisher.publish(event).await;
    }
}
