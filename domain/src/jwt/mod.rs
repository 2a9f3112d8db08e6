//! Bearer token resolution for callers of the push and stream endpoints.
//!
//! Tokens are HMAC-signed JWTs. A verified token yields a [`Principal`]: the caller's
//! identity plus the clearance granted by its role, subscription tier and government
//! flag, resolved through [`AccessLevel::from_claims`].

use crate::error::{EntityErrorKind, Error};
use events::AccessLevel;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;

pub use claims::BearerClaims;

pub(crate) mod claims;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub access_level: AccessLevel,
    pub role: Option<String>,
}

pub struct TokenResolver {
    key: DecodingKey,
    validation: Validation,
}

impl TokenResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // `exp` is still checked whenever a token carries one
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verifies the token and resolves who is calling at what clearance. A valid token
    /// whose claims grant nothing recognisable resolves to `Public`.
    pub fn resolve(&self, token: &str) -> Result<Principal, Error> {
        let claims = decode::<BearerClaims>(token, &self.key, &self.validation)
            .map_err(|err| {
                debug!("Rejected bearer token: {err}");
                Error::from(err)
            })?
            .claims;

        let user_id = claims
            .subject()
            .ok_or_else(|| {
                debug!("Rejected bearer token without a subject");
                Error::entity(EntityErrorKind::Unauthenticated)
            })?
            .to_string();

        let access_level = AccessLevel::from_claims(
            claims.role.as_deref(),
            claims.subscription_tier.as_deref(),
            claims.is_government,
        )
        .unwrap_or_default();

        Ok(Principal {
            user_id,
            access_level,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(claims: &BearerClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(user_id: &str) -> BearerClaims {
        BearerClaims {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    fn is_unauthenticated(err: &Error) -> bool {
        err.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Unauthenticated,
            ))
    }

    #[test]
    fn test_government_flag_wins_over_role_and_tier() -> Result<(), Error> {
        let resolver = TokenResolver::new(SECRET);
        let token = token(
            &BearerClaims {
                role: Some("civilian".to_string()),
                subscription_tier: Some("free".to_string()),
                is_government: true,
                ..claims("user-7")
            },
            SECRET,
        );

        let principal = resolver.resolve(&token)?;
        assert_eq!(principal.user_id, "user-7");
        assert_eq!(principal.access_level, AccessLevel::Government);
        Ok(())
    }

    #[test]
    fn test_tier_applies_when_role_is_unknown() -> Result<(), Error> {
        let resolver = TokenResolver::new(SECRET);
        let token = token(
            &BearerClaims {
                role: Some("pilot".to_string()),
                subscription_tier: Some("supporter".to_string()),
                ..claims("user-9")
            },
            SECRET,
        );

        assert_eq!(resolver.resolve(&token)?.access_level, AccessLevel::Military);
        Ok(())
    }

    #[test]
    fn test_unrecognised_claims_resolve_to_public() -> Result<(), Error> {
        let resolver = TokenResolver::new(SECRET);
        let token = token(&claims("user-1"), SECRET);

        assert_eq!(resolver.resolve(&token)?.access_level, AccessLevel::Public);
        Ok(())
    }

    #[test]
    fn test_sub_is_used_when_user_id_is_absent() -> Result<(), Error> {
        let resolver = TokenResolver::new(SECRET);
        let token = token(
            &BearerClaims {
                sub: Some("user-3".to_string()),
                role: Some("admin".to_string()),
                ..Default::default()
            },
            SECRET,
        );

        let principal = resolver.resolve(&token)?;
        assert_eq!(principal.user_id, "user-3");
        assert_eq!(principal.access_level, AccessLevel::Admin);
        Ok(())
    }

    #[test]
    fn test_wrong_secret_and_missing_subject_are_unauthenticated() {
        let resolver = TokenResolver::new(SECRET);

        let forged = token(&claims("user-7"), "other-secret");
        assert!(is_unauthenticated(&resolver.resolve(&forged).unwrap_err()));

        let anonymous = token(&BearerClaims::default(), SECRET);
        assert!(is_unauthenticated(&resolver.resolve(&anonymous).unwrap_err()));

        assert!(is_unauthenticated(&resolver.resolve("not.a.jwt").unwrap_err()));
    }

    #[test]
    fn test_expired_tokens_are_rejected() {
        let resolver = TokenResolver::new(SECRET);
        let expired = token(
            &BearerClaims {
                exp: Some(1_000),
                ..claims("user-7")
            },
            SECRET,
        );

        assert!(is_unauthenticated(&resolver.resolve(&expired).unwrap_err()));
    }
}
