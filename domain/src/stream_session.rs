//! Capability sessions for live media streams.
//!
//! A session binds one user to one stream until it expires. Creating one returns the
//! only copy of its auth token together with the ICE and signaling configuration the
//! media client needs. Validation distinguishes unknown, expired and forged sessions
//! internally, but callers outside this crate should only ever surface a generic
//! "invalid session".

use crate::error::{Error, SessionErrorKind};
use crate::session_store::SessionStore;
use crate::stream_catalog::StreamCatalog;
use crate::stream_sessions::Model;
use crate::Id;
use chrono::{DateTime, TimeDelta, Utc};
use log::*;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use service::config::{Config, DEFAULT_SIGNALING_URL};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

const TOKEN_BYTES: usize = 32;

pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }
}

/// What a client receives when a session is issued.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub stream_id: String,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Id,
    pub ice_servers: Vec<IceServer>,
    pub signaling_url: String,
    pub auth_token: String,
    #[schema(value_type = String, format = DateTime)]
    pub expires_at: DateTime<Utc>,
}

/// What a successful validation proves about the caller. Never serialized to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_id: Id,
    pub stream_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionBrokerConfig {
    pub ttl: TimeDelta,
    pub ice_servers: Vec<IceServer>,
    pub signaling_url: String,
}

impl Default for SessionBrokerConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::hours(24),
            ice_servers: vec![IceServer::stun(DEFAULT_STUN_SERVERS)],
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
        }
    }
}

impl SessionBrokerConfig {
    pub fn from_config(config: &Config) -> Self {
        let mut ice_servers = vec![IceServer::stun(DEFAULT_STUN_SERVERS)];
        if let Some(turn_server) = config.turn_server() {
            ice_servers.push(IceServer {
                urls: vec![turn_server],
                username: config.turn_username(),
                credential: config.turn_password(),
            });
        }

        Self {
            ttl: i64::try_from(config.session_ttl_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or_else(|| TimeDelta::hours(24)),
            ice_servers,
            signaling_url: config.signaling_url().to_string(),
        }
    }
}

pub struct SessionBroker {
    catalog: Arc<dyn StreamCatalog>,
    store: Arc<dyn SessionStore>,
    config: SessionBrokerConfig,
}

impl SessionBroker {
    pub fn new(
        catalog: Arc<dyn StreamCatalog>,
        store: Arc<dyn SessionStore>,
        config: SessionBrokerConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    pub async fn create_session(
        &self,
        stream_id: &str,
        user_id: &str,
    ) -> Result<SessionDescriptor, Error> {
        self.create_session_at(stream_id, user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        stream_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionDescriptor, Error> {
        // Fails before anything is generated or stored
        let stream = self.catalog.find(stream_id).await?;

        let auth_token = generate_token();
        let expires_at = now + self.config.ttl;
        let session = Model {
            id: Id::new_v4(),
            stream_id: stream.id,
            user_id: user_id.to_string(),
            auth_token,
            expires_at: expires_at.into(),
            created_at: now.into(),
        };
        self.store.insert(session.clone()).await?;

        info!(
            "Issued stream session {} on stream {} for user {}, expires {}",
            session.id, session.stream_id, session.user_id, expires_at
        );

        Ok(SessionDescriptor {
            stream_id: session.stream_id,
            session_id: session.id,
            ice_servers: self.config.ice_servers.clone(),
            signaling_url: self.config.signaling_url.clone(),
            auth_token: session.auth_token,
            expires_at,
        })
    }

    /// Checks a presented token. Success does not consume the session.
    pub async fn validate_session(
        &self,
        session_id: &str,
        token: &str,
    ) -> Result<SessionGrant, Error> {
        self.validate_session_at(session_id, token, Utc::now()).await
    }

    pub async fn validate_session_at(
        &self,
        session_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionGrant, Error> {
        let Ok(session_id) = session_id.parse::<Id>() else {
            debug!("Rejected malformed stream session id");
            return Err(Error::session(SessionErrorKind::NotFound));
        };

        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| Error::session(SessionErrorKind::NotFound))?;

        let expires_at = session.expires_at.with_timezone(&Utc);
        if now >= expires_at {
            debug!("Stream session {session_id} expired at {expires_at}, evicting");
            self.store.remove(session_id).await?;
            return Err(Error::session(SessionErrorKind::Expired));
        }

        let presented: &[u8] = token.as_bytes();
        if !bool::from(presented.ct_eq(session.auth_token.as_bytes())) {
            warn!("Rejected stream session {session_id}: token mismatch");
            return Err(Error::session(SessionErrorKind::InvalidToken));
        }

        Ok(SessionGrant {
            session_id,
            stream_id: session.stream_id,
            user_id: session.user_id,
            expires_at,
        })
    }

    /// Returns whether a session was revoked. Revoking an unknown session is not an error.
    pub async fn revoke_session(&self, session_id: Id) -> Result<bool, Error> {
        let revoked = self.store.remove(session_id).await?;
        if revoked {
            info!("Revoked stream session {session_id}");
        }
        Ok(revoked)
    }

    pub async fn purge_expired(&self) -> Result<u64, Error> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let purged = self.store.remove_expired(now).await?;
        if purged > 0 {
            debug!("Purged {purged} expired stream sessions");
        }
        Ok(purged)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use crate::session_store::MemorySessionStore;
    use crate::stream_catalog::MemoryStreamCatalog;
    use crate::streams;
    use chrono::TimeZone;

    fn stream(id: &str) -> streams::Model {
        streams::Model {
            id: id.to_string(),
            title: "Lunar relay".to_string(),
            stream_type: "civilian".to_string(),
            status: "live".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn broker() -> (SessionBroker, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let catalog = MemoryStreamCatalog::new().with_stream(stream("stream-42"));
        let broker = SessionBroker::new(
            Arc::new(catalog),
            store.clone(),
            SessionBrokerConfig::default(),
        );
        (broker, store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn session_kind(err: Error) -> SessionErrorKind {
        match err.error_kind {
            DomainErrorKind::Session(kind) => kind,
            other => panic!("expected a session error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_is_valid_after_an_hour_and_expired_after_a_day() -> Result<(), Error> {
        let (broker, store) = broker();
        let descriptor = broker.create_session_at("stream-42", "user-7", t0()).await?;
        let session_id = descriptor.session_id.to_string();

        assert_eq!(descriptor.expires_at, t0() + TimeDelta::hours(24));
        assert_eq!(descriptor.auth_token.len(), 64);
        assert!(descriptor
            .auth_token
            .chars()
            .all(|c| c.is_ascii_hexdigit()));

        let grant = broker
            .validate_session_at(&session_id, &descriptor.auth_token, t0() + TimeDelta::hours(1))
            .await?;
        assert_eq!(grant.stream_id, "stream-42");
        assert_eq!(grant.user_id, "user-7");

        // Validation does not consume the session
        broker
            .validate_session_at(&session_id, &descriptor.auth_token, t0() + TimeDelta::hours(2))
            .await?;

        let err = broker
            .validate_session_at(&session_id, &descriptor.auth_token, t0() + TimeDelta::hours(25))
            .await
            .unwrap_err();
        assert_eq!(session_kind(err), SessionErrorKind::Expired);
        assert!(store.is_empty(), "expired session should be evicted");

        // Failing again after expiry is stable
        let err = broker
            .validate_session_at(&session_id, &descriptor.auth_token, t0() + TimeDelta::hours(26))
            .await
            .unwrap_err();
        assert_eq!(session_kind(err), SessionErrorKind::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn test_any_single_byte_mutation_of_the_token_is_rejected() -> Result<(), Error> {
        let (broker, _) = broker();
        let descriptor = broker.create_session_at("stream-42", "user-7", t0()).await?;
        let session_id = descriptor.session_id.to_string();
        let now = t0() + TimeDelta::minutes(5);

        for index in 0..descriptor.auth_token.len() {
            let mut mutated = descriptor.auth_token.clone().into_bytes();
            mutated[index] = if mutated[index] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).unwrap();

            let err = broker
                .validate_session_at(&session_id, &mutated, now)
                .await
                .unwrap_err();
            assert_eq!(session_kind(err), SessionErrorKind::InvalidToken);
        }

        let truncated = &descriptor.auth_token[..63];
        let err = broker
            .validate_session_at(&session_id, truncated, now)
            .await
            .unwrap_err();
        assert_eq!(session_kind(err), SessionErrorKind::InvalidToken);

        // The original token still works afterwards
        broker
            .validate_session_at(&session_id, &descriptor.auth_token, now)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_stream_fails_without_storing_anything() {
        let (broker, store) = broker();

        let err = broker
            .create_session_at("stream-404", "user-7", t0())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_session_ids_are_not_found() {
        let (broker, _) = broker();

        let err = broker
            .validate_session_at(&Id::new_v4().to_string(), "00", t0())
            .await
            .unwrap_err();
        assert_eq!(session_kind(err), SessionErrorKind::NotFound);

        let err = broker
            .validate_session_at("not-a-uuid", "00", t0())
            .await
            .unwrap_err();
        assert_eq!(session_kind(err), SessionErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_tokens_are_unique_per_session() -> Result<(), Error> {
        let (broker, _) = broker();
        let first = broker.create_session_at("stream-42", "user-7", t0()).await?;
        let second = broker.create_session_at("stream-42", "user-7", t0()).await?;

        assert_ne!(first.session_id, second.session_id);
        assert_ne!(first.auth_token, second.auth_token);
        Ok(())
    }

    #[tokio::test]
    async fn test_revoke_and_purge() -> Result<(), Error> {
        let (broker, store) = broker();
        let revoked = broker.create_session_at("stream-42", "user-7", t0()).await?;
        broker.create_session_at("stream-42", "user-8", t0()).await?;

        assert!(broker.revoke_session(revoked.session_id).await?);
        assert!(!broker.revoke_session(revoked.session_id).await?);
        assert_eq!(store.len(), 1);

        assert_eq!(broker.purge_expired_at(t0() + TimeDelta::hours(1)).await?, 0);
        assert_eq!(broker.purge_expired_at(t0() + TimeDelta::hours(24)).await?, 1);
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_broker_config_adds_turn_relay_when_configured() {
        use clap::Parser;

        let config = Config::parse_from([
            "realtime_backbone",
            "--session-ttl-secs",
            "3600",
            "--turn-server",
            "turn:relay.asgard.local:3478",
            "--turn-username",
            "relay",
            "--turn-password",
            "secret",
        ]);
        let broker_config = SessionBrokerConfig::from_config(&config);

        assert_eq!(broker_config.ttl, TimeDelta::hours(1));
        assert_eq!(broker_config.ice_servers.len(), 2);
        assert_eq!(
            broker_config.ice_servers[1],
            IceServer {
                urls: vec!["turn:relay.asgard.local:3478".to_string()],
                username: Some("relay".to_string()),
                credential: Some("secret".to_string()),
            }
        );

        let without_turn = SessionBrokerConfig::from_config(&Config::parse_from(["realtime_backbone"]));
        assert_eq!(without_turn.ice_servers.len(), 1);
    }

    #[test]
    fn test_descriptor_serializes_in_camel_case() {
        let descriptor = SessionDescriptor {
            stream_id: "stream-42".to_string(),
            session_id: Id::nil(),
            ice_servers: SessionBrokerConfig::default().ice_servers,
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            auth_token: "ab".repeat(32),
            expires_at: t0(),
        };

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["streamId"], "stream-42");
        assert_eq!(json["signalingUrl"], DEFAULT_SIGNALING_URL);
        assert_eq!(json["iceServers"][0]["urls"][1], "stun:stun1.l.google.com:19302");
        assert!(json["iceServers"][0].get("username").is_none());
        assert!(json.get("authToken").is_some());
        assert!(json.get("expiresAt").is_some());
    }
}
