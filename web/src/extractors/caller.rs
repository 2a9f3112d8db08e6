use crate::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::{header::AUTHORIZATION, request::Parts};
use domain::jwt::Principal;
use events::{parse_access_level, AccessLevel};
use log::*;
use realtime::ANONYMOUS_USER;
use serde::Deserialize;
use std::convert::Infallible;

/// Who is calling. A bearer token is read from `Authorization: Bearer` or `?token=`.
/// Missing, unverifiable or unconfigured tokens all yield `Anonymous`, which can never
/// see more than public data.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Caller {
    Authenticated(Principal),
    Anonymous,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Caller::Anonymous);
        };

        let Some(resolver) = &state.tokens else {
            debug!("Bearer token presented but no JWT secret is configured, treating caller as anonymous");
            return Ok(Caller::Anonymous);
        };

        match resolver.resolve(&token) {
            Ok(principal) => Ok(Caller::Authenticated(principal)),
            Err(_) => Ok(Caller::Anonymous),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    from_header
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.token)
        })
        .filter(|token| !token.is_empty())
}

impl Caller {
    /// Identity and clearance for a push connection. `requested` may lower an
    /// authenticated caller's clearance but never raise it; anonymous callers are
    /// always capped at `Public`.
    pub(crate) fn push_identity(&self, requested: Option<&str>) -> (String, AccessLevel) {
        let requested = requested.and_then(parse_access_level);
        match self {
            Caller::Authenticated(principal) => {
                let level = requested
                    .map(|level| level.min(principal.access_level))
                    .unwrap_or(principal.access_level);
                (principal.user_id.clone(), level)
            }
            Caller::Anonymous => {
                if requested.is_some_and(|level| level > AccessLevel::Public) {
                    debug!("Anonymous caller requested {requested:?}, capping at public");
                }
                (ANONYMOUS_USER.to_string(), AccessLevel::Public)
            }
        }
    }

    /// The caller's user id, or a fresh viewer id for anonymous callers.
    pub(crate) fn viewer_id(&self) -> String {
        match self {
            Caller::Authenticated(principal) => principal.user_id.clone(),
            Caller::Anonymous => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Clearance used to gate stream routes. Anonymous callers are public.
    pub(crate) fn access_level(&self) -> AccessLevel {
        match self {
            Caller::Authenticated(principal) => principal.access_level,
            Caller::Anonymous => AccessLevel::Public,
        }
    }

    pub(crate) fn role(&self) -> Option<&str> {
        match self {
            Caller::Authenticated(principal) => principal.role.as_deref(),
            Caller::Anonymous => None,
        }
    }
}
