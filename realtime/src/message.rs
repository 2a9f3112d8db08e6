//! Wire frames exchanged with push clients.

use chrono::{DateTime, Utc};
use events::{AccessLevel, Event};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Frame sent from the server to a client: `{"type","timestamp","payload"}`.
///
/// Frames built from events also carry the event's id, source and priority so clients
/// can deduplicate and sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl ServerFrame {
    fn control(frame_type: &str, payload: Value) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            timestamp: Utc::now(),
            payload,
            id: None,
            source: None,
            priority: None,
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            frame_type: event.event_type().to_string(),
            timestamp: event.timestamp(),
            payload: event.payload().clone(),
            id: Some(event.id().to_string()),
            source: Some(event.source().to_string()).filter(|s| !s.is_empty()),
            priority: Some(event.priority()),
        }
    }

    pub fn welcome(connection_id: &str, user_id: &str, access_level: AccessLevel) -> Self {
        Self::control(
            "welcome",
            json!({
                "clientId": connection_id,
                "userId": user_id,
                "accessLevel": access_level,
            }),
        )
    }

    pub fn pong() -> Self {
        Self::control("pong", json!({}))
    }

    pub fn subscribed(channel: &str) -> Self {
        Self::control("subscribed", json!({ "channel": channel }))
    }

    pub fn unsubscribed(channel: &str) -> Self {
        Self::control("unsubscribed", json!({ "channel": channel }))
    }

    pub fn error(message: &str) -> Self {
        Self::control("error", json!({ "message": message }))
    }
}

/// Frame sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

impl ClientFrame {
    /// Parses a text frame. Unknown or malformed frames return a short reason suitable
    /// for an `error` reply.
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        let value: Value = serde_json::from_str(text).map_err(|_| "malformed frame")?;
        match value.get("type").and_then(Value::as_str) {
            Some("subscribe") | Some("unsubscribe") | Some("ping") => {}
            Some(_) => return Err("unknown frame type"),
            None => return Err("missing frame type"),
        }
        let frame: ClientFrame = serde_json::from_value(value).map_err(|_| "malformed frame")?;
        match &frame {
            ClientFrame::Subscribe { channel } | ClientFrame::Unsubscribe { channel }
                if channel.trim().is_empty() =>
            {
                Err("channel is required")
            }
            _ => Ok(frame),
        }
    }
}
