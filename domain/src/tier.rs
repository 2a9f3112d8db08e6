//! Stream-type gating by clearance.
//!
//! Every stream type requires a clearance level. Callers are gated on the clearance
//! resolved from their token; subscription tiers grant one through
//! [`SubscriptionTier::access_level`], so a higher tier always sees a superset of what
//! a lower tier sees.

use events::{clears, AccessLevel, SubscriptionTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StreamType {
    Civilian,
    Military,
    Interstellar,
    Other(String),
}

impl StreamType {
    pub const KNOWN: [StreamType; 3] = [
        StreamType::Civilian,
        StreamType::Military,
        StreamType::Interstellar,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            StreamType::Civilian => "civilian",
            StreamType::Military => "military",
            StreamType::Interstellar => "interstellar",
            StreamType::Other(other) => other,
        }
    }

    /// Clearance needed to watch a stream of this type. Unknown types are public.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            StreamType::Civilian => AccessLevel::Civilian,
            StreamType::Military => AccessLevel::Military,
            StreamType::Interstellar => AccessLevel::Government,
            StreamType::Other(_) => AccessLevel::Public,
        }
    }
}

impl From<&str> for StreamType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "civilian" => StreamType::Civilian,
            "military" => StreamType::Military,
            "interstellar" => StreamType::Interstellar,
            other => StreamType::Other(other.to_string()),
        }
    }
}

impl From<String> for StreamType {
    fn from(value: String) -> Self {
        StreamType::from(value.as_str())
    }
}

impl From<StreamType> for String {
    fn from(value: StreamType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The known stream types a clearance (or the tier granting it) may watch.
pub fn allowed_stream_types(level: impl Into<AccessLevel>) -> BTreeSet<StreamType> {
    let level = level.into();
    StreamType::KNOWN
        .into_iter()
        .filter(|stream_type| can_access_stream_type(level, stream_type))
        .collect()
}

pub fn can_access_stream_type(level: impl Into<AccessLevel>, stream_type: &StreamType) -> bool {
    clears(level.into(), stream_type.required_level())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_see_monotonic_supersets() {
        for lower in SubscriptionTier::ALL {
            for higher in SubscriptionTier::ALL {
                if lower.access_level() <= higher.access_level() {
                    assert!(
                        allowed_stream_types(lower).is_subset(&allowed_stream_types(higher)),
                        "{lower} should see a subset of {higher}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_tier_table() {
        assert!(allowed_stream_types(SubscriptionTier::Free).is_empty());
        assert_eq!(
            allowed_stream_types(SubscriptionTier::Observer),
            BTreeSet::from([StreamType::Civilian])
        );
        assert_eq!(
            allowed_stream_types(SubscriptionTier::Supporter),
            BTreeSet::from([StreamType::Civilian, StreamType::Military])
        );
        assert_eq!(
            allowed_stream_types(SubscriptionTier::Commander),
            BTreeSet::from(StreamType::KNOWN)
        );
    }

    #[test]
    fn test_unknown_stream_types_are_public() {
        let drone_feed = StreamType::from("Drone-Feed");

        assert_eq!(drone_feed, StreamType::Other("drone-feed".to_string()));
        for tier in SubscriptionTier::ALL {
            assert!(can_access_stream_type(tier, &drone_feed));
        }
    }

    #[test]
    fn test_clearance_gates_like_the_tier_that_grants_it() {
        for tier in SubscriptionTier::ALL {
            assert_eq!(
                allowed_stream_types(tier),
                allowed_stream_types(tier.access_level())
            );
        }
        // Admin clearance comes from a role, not a tier
        assert_eq!(
            allowed_stream_types(AccessLevel::Admin),
            BTreeSet::from(StreamType::KNOWN)
        );
        assert!(!can_access_stream_type(AccessLevel::Public, &StreamType::Civilian));
        assert!(can_access_stream_type(AccessLevel::Military, &StreamType::Military));
        assert!(!can_access_stream_type(AccessLevel::Military, &StreamType::Interstellar));
    }

    #[test]
    fn test_stream_type_parsing_is_case_insensitive() {
        assert_eq!(StreamType::from(" MILITARY "), StreamType::Military);
        assert_eq!(String::from(StreamType::Interstellar), "interstellar");
    }
}
