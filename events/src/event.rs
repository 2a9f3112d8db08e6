//! The envelope for everything distributed through the backbone.

use crate::access::AccessLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifies the domain meaning of an event. Open-ended: producers may send types the
/// backbone does not know about, which are carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Alert,
    Threat,
    Telemetry,
    SatelliteStatus,
    HunoidStatus,
    MissionUpdate,
    StreamUpdate,
    StreamChat,
    ControlCommand,
    SecurityFinding,
    SystemHealth,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Alert => "alert",
            EventType::Threat => "threat",
            EventType::Telemetry => "telemetry",
            EventType::SatelliteStatus => "satellite_status",
            EventType::HunoidStatus => "hunoid_status",
            EventType::MissionUpdate => "mission_update",
            EventType::StreamUpdate => "stream_update",
            EventType::StreamChat => "stream_chat",
            EventType::ControlCommand => "control_command",
            EventType::SecurityFinding => "security_finding",
            EventType::SystemHealth => "system_health",
            EventType::Other(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "alert" => EventType::Alert,
            "threat" => EventType::Threat,
            "telemetry" => EventType::Telemetry,
            "satellite_status" => EventType::SatelliteStatus,
            "hunoid_status" => EventType::HunoidStatus,
            "mission_update" => EventType::MissionUpdate,
            // Both spellings are in circulation among producers.
            "stream_update" | "stream-update" => EventType::StreamUpdate,
            "stream_chat" | "stream-chat" => EventType::StreamChat,
            "control_command" | "control-command" => EventType::ControlCommand,
            "security_finding" => EventType::SecurityFinding,
            "system_health" => EventType::SystemHealth,
            _ => EventType::Other(value),
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default priority for events whose producer did not express one.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Bounds of the priority scale; `critical` severity sits at the top.
pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_payload() -> Value {
    Value::Object(Default::default())
}

/// A domain event as it travels from producers to connected viewers.
///
/// Fields are private so an event cannot be altered once built. Use [`Event::builder`]
/// to construct one, or deserialize the wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    source: String,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default = "default_payload")]
    payload: Value,
    #[serde(default)]
    access_level: AccessLevel,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_user_id: Option<String>,
}

impl Event {
    pub fn builder(event_type: impl Into<EventType>) -> EventBuilder {
        EventBuilder::new(event_type.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn target_user_id(&self) -> Option<&str> {
        self.target_user_id.as_deref()
    }

    /// Returns a copy of this event whose required level is at least `floor`.
    pub fn with_minimum_level(mut self, floor: AccessLevel) -> Self {
        if self.access_level < floor {
            self.access_level = floor;
        }
        self
    }
}

pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    fn new(event_type: EventType) -> Self {
        Self {
            event: Event {
                id: uuid::Uuid::new_v4().to_string(),
                event_type,
                source: String::new(),
                timestamp: Utc::now(),
                payload: default_payload(),
                access_level: AccessLevel::default(),
                priority: DEFAULT_PRIORITY,
                target_user_id: None,
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.event.id = id.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.event.source = source.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.event.payload = payload;
        self
    }

    pub fn access_level(mut self, level: AccessLevel) -> Self {
        self.event.access_level = level;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.event.priority = priority;
        self
    }

    pub fn target_user(mut self, user_id: impl Into<String>) -> Self {
        self.event.target_user_id = Some(user_id.into());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

/// Derives a priority hint from a raw payload: an explicit numeric `priority` wins,
/// otherwise a `severity` label is mapped, otherwise [`DEFAULT_PRIORITY`].
///
/// Explicit priorities are truncated and clamped to `MIN_PRIORITY..=MAX_PRIORITY`.
pub fn priority_from_payload(payload: &Value) -> i32 {
    if let Some(priority) = payload.get("priority").and_then(Value::as_f64) {
        if priority.is_nan() {
            return DEFAULT_PRIORITY;
        }
        return priority
            .trunc()
            .clamp(f64::from(MIN_PRIORITY), f64::from(MAX_PRIORITY)) as i32;
    }

    match payload.get("severity").and_then(Value::as_str) {
        Some("critical") => 10,
        Some("high") => 7,
        Some("medium") => 5,
        Some("low") => 2,
        _ => DEFAULT_PRIORITY,
    }
}
