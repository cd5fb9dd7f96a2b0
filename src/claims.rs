//! Decoded identity-token claims and role extraction.
//!
//! The provider issues realm-level roles under `realm_access.roles` and
//! per-client roles under `resource_access.{client}.roles`. The portal
//! treats the union of both as the user's effective role set.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A bare list of role names, as nested inside the access claims.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleList {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims carried by a validated access token.
///
/// Only the claims the portal consumes are modeled; everything else in
/// the token is ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Provider-side subject identifier.
    pub sub: String,
    /// Expiration time (Unix timestamp seconds).
    pub exp: i64,
    /// Issued at (Unix timestamp seconds).
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RoleList>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleList>,
}

impl TokenClaims {
    /// Effective role set: realm roles plus every resource's roles,
    /// deduplicated. Absent claims contribute nothing; a token with no
    /// role information yields an empty set.
    pub fn roles(&self) -> HashSet<String> {
        let mut roles: HashSet<String> = self
            .realm_access
            .iter()
            .flat_map(|access| access.roles.iter().cloned())
            .collect();
        for access in self.resource_access.values() {
            roles.extend(access.roles.iter().cloned());
        }
        roles
    }

    /// Display name, falling back the way the original portal chrome did.
    pub fn username(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or("user")
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Seconds of validity left; negative once expired.
    pub fn expires_in(&self) -> i64 {
        self.exp - Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_from(value: serde_json::Value) -> TokenClaims {
        serde_json::from_value(value).expect("claims must deserialize")
    }

    #[test]
    fn missing_access_claims_yield_empty_set() {
        let claims = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64
        }));
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn realm_and_resource_roles_are_unioned() {
        let claims = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64,
            "realm_access": {"roles": ["admin"]},
            "resource_access": {"svc": {"roles": ["trader"]}}
        }));
        let roles = claims.roles();
        assert_eq!(roles.len(), 2);
        assert!(roles.contains("admin"));
        assert!(roles.contains("trader"));
    }

    #[test]
    fn duplicate_roles_across_claims_collapse() {
        let claims = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64,
            "realm_access": {"roles": ["viewer", "trader"]},
            "resource_access": {
                "svc-a": {"roles": ["trader"]},
                "svc-b": {"roles": ["viewer", "admin"]}
            }
        }));
        let roles = claims.roles();
        assert_eq!(roles.len(), 3);
    }

    #[test]
    fn username_falls_back_when_claim_absent() {
        let anonymous = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64
        }));
        assert_eq!(anonymous.username(), "user");

        let named = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64,
            "preferred_username": "ada"
        }));
        assert_eq!(named.username(), "ada");
    }

    #[test]
    fn resource_entry_without_roles_list_is_empty() {
        let claims = claims_from(serde_json::json!({
            "sub": "abc",
            "exp": 2_000_000_000u64,
            "resource_access": {"svc": {}}
        }));
        assert!(claims.roles().is_empty());
    }
}
