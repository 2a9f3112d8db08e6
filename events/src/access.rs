//! Clearance tiers and the canonical subscription-tier table.
//!
//! `AccessLevel` is a total order `Public < Civilian < Military < Government < Admin`.
//! Comparing ranks via [`clears`] is the only place broadcast eligibility is decided.
//!
//! Subscription tiers (`free`, `observer`, `supporter`, `commander`) map onto clearance
//! tiers through [`SubscriptionTier::access_level`]. Both credential resolution for push
//! connections and stream-type gating go through that one table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    // Events that carry no level are informational and readable by everyone.
    #[default]
    Public,
    Civilian,
    Military,
    Government,
    Admin,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Public,
        AccessLevel::Civilian,
        AccessLevel::Military,
        AccessLevel::Government,
        AccessLevel::Admin,
    ];

    /// Numeric rank backing all comparisons.
    pub fn rank(self) -> u8 {
        match self {
            AccessLevel::Public => 0,
            AccessLevel::Civilian => 1,
            AccessLevel::Military => 2,
            AccessLevel::Government => 3,
            AccessLevel::Admin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Civilian => "civilian",
            AccessLevel::Military => "military",
            AccessLevel::Government => "government",
            AccessLevel::Admin => "admin",
        }
    }

    /// Resolves the clearance granted by a set of credential claims.
    ///
    /// An `admin` role wins over everything, then government membership, then any role
    /// known to the alias table, then the subscription tier. Returns `None` when nothing
    /// in the claims is recognised so the caller can apply its own default.
    pub fn from_claims(role: Option<&str>, tier: Option<&str>, is_government: bool) -> Option<Self> {
        let role_level = role.and_then(parse_access_level);
        if role_level == Some(AccessLevel::Admin) {
            return Some(AccessLevel::Admin);
        }

        if is_government {
            return Some(AccessLevel::Government);
        }

        if let Some(level) = role_level {
            return Some(level);
        }

        tier.and_then(|t| t.parse::<SubscriptionTier>().ok())
            .map(SubscriptionTier::access_level)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AccessLevelParseError;

impl FromStr for AccessLevel {
    type Err = AccessLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_access_level(s).ok_or(AccessLevelParseError)
    }
}

/// True iff a connection at `connection_level` may receive data requiring `required_level`.
pub fn clears(connection_level: AccessLevel, required_level: AccessLevel) -> bool {
    connection_level.rank() >= required_level.rank()
}

/// Parses a clearance name or one of its legacy aliases (case-insensitive).
pub fn parse_access_level(value: &str) -> Option<AccessLevel> {
    let normalized = value.trim().to_lowercase();
    match normalized.as_str() {
        "public" => Some(AccessLevel::Public),
        "civilian" => Some(AccessLevel::Civilian),
        "military" => Some(AccessLevel::Military),
        "government" | "gov" => Some(AccessLevel::Government),
        "admin" => Some(AccessLevel::Admin),
        // Legacy role names
        "user" | "subscriber" => Some(AccessLevel::Civilian),
        "interstellar" => Some(AccessLevel::Government),
        other => other
            .parse::<SubscriptionTier>()
            .ok()
            .map(SubscriptionTier::access_level),
    }
}

/// Paid subscription tiers, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Observer,
    Supporter,
    Commander,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 4] = [
        SubscriptionTier::Free,
        SubscriptionTier::Observer,
        SubscriptionTier::Supporter,
        SubscriptionTier::Commander,
    ];

    /// The canonical tier to clearance table.
    pub fn access_level(self) -> AccessLevel {
        match self {
            SubscriptionTier::Free => AccessLevel::Public,
            SubscriptionTier::Observer => AccessLevel::Civilian,
            SubscriptionTier::Supporter => AccessLevel::Military,
            SubscriptionTier::Commander => AccessLevel::Government,
        }
    }

    /// Unknown tier names are treated as `free`.
    pub fn parse_or_free(value: &str) -> Self {
        value.parse().unwrap_or(SubscriptionTier::Free)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Observer => "observer",
            SubscriptionTier::Supporter => "supporter",
            SubscriptionTier::Commander => "commander",
        }
    }
}

impl From<SubscriptionTier> for AccessLevel {
    fn from(tier: SubscriptionTier) -> Self {
        tier.access_level()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionTierParseError;

impl FromStr for SubscriptionTier {
    type Err = SubscriptionTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "observer" => Ok(SubscriptionTier::Observer),
            "supporter" => Ok(SubscriptionTier::Supporter),
            "commander" => Ok(SubscriptionTier::Commander),
            _ => Err(SubscriptionTierParseError),
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_are_strictly_increasing() {
        for pair in AccessLevel::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_clears_matches_rank_comparison() {
        for connection in AccessLevel::ALL {
            for required in AccessLevel::ALL {
                assert_eq!(
                    clears(connection, required),
                    connection.rank() >= required.rank(),
                    "{connection} vs {required}"
                );
            }
        }
    }

    #[test]
    fn test_clearance_is_transitive_for_random_triples() {
        use rand::seq::SliceRandom;

        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let a = *AccessLevel::ALL.choose(&mut rng).unwrap();
            let b = *AccessLevel::ALL.choose(&mut rng).unwrap();
            let c = *AccessLevel::ALL.choose(&mut rng).unwrap();
            if clears(a, b) && clears(b, c) {
                assert!(clears(a, c), "{a} >= {b} >= {c}");
            }
        }
    }

    #[test]
    fn test_admin_clears_everything_and_public_clears_only_public() {
        for required in AccessLevel::ALL {
            assert!(clears(AccessLevel::Admin, required));
        }
        assert!(clears(AccessLevel::Public, AccessLevel::Public));
        assert!(!clears(AccessLevel::Public, AccessLevel::Civilian));
    }

    #[test]
    fn test_parse_access_level_accepts_names_in_any_case() {
        assert_eq!(parse_access_level("MILITARY"), Some(AccessLevel::Military));
        assert_eq!(parse_access_level(" government "), Some(AccessLevel::Government));
        assert_eq!(parse_access_level("Admin"), Some(AccessLevel::Admin));
    }

    #[test]
    fn test_parse_access_level_resolves_legacy_aliases() {
        assert_eq!(parse_access_level("free"), Some(AccessLevel::Public));
        assert_eq!(parse_access_level("observer"), Some(AccessLevel::Civilian));
        assert_eq!(parse_access_level("supporter"), Some(AccessLevel::Military));
        assert_eq!(parse_access_level("commander"), Some(AccessLevel::Government));
        assert_eq!(parse_access_level("subscriber"), Some(AccessLevel::Civilian));
        assert_eq!(parse_access_level("interstellar"), Some(AccessLevel::Government));
    }

    #[test]
    fn test_parse_access_level_rejects_unknown_and_empty() {
        assert_eq!(parse_access_level(""), None);
        assert_eq!(parse_access_level("superuser"), None);
        assert!("nope".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_missing_level_defaults_to_public() {
        assert_eq!(AccessLevel::default(), AccessLevel::Public);
    }

    #[test]
    fn test_tier_table_is_monotonic() {
        for pair in SubscriptionTier::ALL.windows(2) {
            assert!(pair[0].access_level() < pair[1].access_level());
        }
    }

    #[test]
    fn test_unknown_tier_parses_as_free() {
        assert_eq!(SubscriptionTier::parse_or_free("platinum"), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::parse_or_free("Supporter"), SubscriptionTier::Supporter);
    }

    #[test]
    fn test_from_claims_precedence() {
        assert_eq!(
            AccessLevel::from_claims(Some("admin"), Some("free"), true),
            Some(AccessLevel::Admin)
        );
        assert_eq!(
            AccessLevel::from_claims(Some("user"), Some("free"), true),
            Some(AccessLevel::Government)
        );
        assert_eq!(
            AccessLevel::from_claims(Some("admin"), Some("free"), false),
            Some(AccessLevel::Admin)
        );
        assert_eq!(
            AccessLevel::from_claims(Some("pilot"), Some("supporter"), false),
            Some(AccessLevel::Military)
        );
        assert_eq!(
            AccessLevel::from_claims(Some("user"), Some("commander"), false),
            Some(AccessLevel::Civilian)
        );
        assert_eq!(AccessLevel::from_claims(None, None, false), None);
        assert_eq!(AccessLevel::from_claims(Some("pilot"), Some("gold"), false), None);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AccessLevel::Government).unwrap();
        assert_eq!(json, "\"government\"");
        let level: AccessLevel = serde_json::from_str("\"civilian\"").unwrap();
        assert_eq!(level, AccessLevel::Civilian);
    }
}
