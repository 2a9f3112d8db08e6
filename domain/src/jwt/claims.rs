//! Claims carried by bearer tokens presented to the push and stream endpoints.
//!
//! Only the fields that decide identity and clearance are modeled. Unknown claims are
//! ignored and every modeled claim is optional, so tokens minted by older issuers
//! still resolve (to the lowest clearance they can prove).

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BearerClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub is_government: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl BearerClaims {
    /// `user_id` wins over the registered `sub` claim.
    pub(crate) fn subject(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|id| !id.is_empty())
    }
}
