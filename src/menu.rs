//! Static navigation menu and its role-based projection.

use std::collections::HashSet;

use crate::access::{can_access, roles};

#[derive(Debug, Clone, Copy)]
pub struct MenuEntry {
    pub path: &'static str,
    pub label: &'static str,
    pub allowed_roles: &'static [&'static str],
}

/// Authored once, ordered; the filter never reorders or deduplicates.
pub const MENU: &[MenuEntry] = &[
    MenuEntry {
        path: "/home",
        label: "Home",
        allowed_roles: &[roles::VIEWER, roles::TRADER, roles::ADMIN, roles::ROOT],
    },
    MenuEntry {
        path: "/config",
        label: "Configs",
        allowed_roles: &[roles::ADMIN, roles::ROOT],
    },
    MenuEntry {
        path: "/analytics",
        label: "Analytics",
        allowed_roles: &[roles::VIEWER, roles::TRADER, roles::ADMIN, roles::ROOT],
    },
    MenuEntry {
        path: "/api-docs",
        label: "API (Swagger)",
        allowed_roles: &[roles::ADMIN, roles::ROOT],
    },
    MenuEntry {
        path: "/auth-console",
        label: "SSO Console",
        allowed_roles: &[roles::ROOT],
    },
    MenuEntry {
        path: "/root-config",
        label: "Root Config",
        allowed_roles: &[roles::ROOT],
    },
];

/// Entries the current role set may see, in authored order. Uses the
/// same membership test as the route guard.
pub fn visible<'a>(entries: &'a [MenuEntry], roles: &HashSet<String>) -> Vec<&'a MenuEntry> {
    entries
        .iter()
        .filter(|entry| can_access(entry.allowed_roles, roles))
        .collect()
}
