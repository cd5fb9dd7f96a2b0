//! Role-based access evaluation.
//!
//! Both the route guard and the navigation menu filter decide visibility
//! through [`can_access`], so a page is reachable exactly when its menu
//! entry is rendered.

use std::collections::HashSet;

use serde::Serialize;
use utoipa::ToSchema;

use crate::identity::SessionSnapshot;

/// Well-known role names
pub mod roles {
    pub const ROOT: &str = "root";
    pub const ADMIN: &str = "admin";
    pub const TRADER: &str = "trader";
    pub const VIEWER: &str = "viewer";
}

/// Shared membership test: an empty allow-list means "no restriction",
/// otherwise the user needs at least one of the listed roles.
pub fn can_access(allowed: &[&str], roles: &HashSet<String>) -> bool {
    allowed.is_empty() || allowed.iter().any(|role| roles.contains(*role))
}

/// Outcome of guarding one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// Session initialization has not finished; nothing may render yet.
    Loading,
    /// Initialization finished without a session; the login redirect is
    /// owned by the session adapter, the guard only reports the state.
    Unauthenticated,
    /// Authenticated but the role set does not intersect the page's
    /// allow-list. Terminal for this navigation.
    Denied,
    Allowed,
}

/// Evaluate a page's allow-list against the current session snapshot.
pub fn evaluate(snapshot: &SessionSnapshot, allowed: &[&str]) -> GuardState {
    if !snapshot.ready {
        return GuardState::Loading;
    }
    if !snapshot.authenticated {
        return GuardState::Unauthenticated;
    }
    let roles = snapshot.roles();
    if can_access(allowed, &roles) {
        GuardState::Allowed
    } else {
        GuardState::Denied
    }
}
