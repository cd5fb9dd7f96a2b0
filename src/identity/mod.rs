//! Identity session management.
//!
//! This module owns the OpenID-Connect session for the lifetime of the
//! process: it wraps the provider behind the [`IdentityClient`] seam,
//! keeps the access token alive with a timer-driven refresh task, and
//! exposes read-only session snapshots to the route guard and the menu
//! filter. Only the session adapter mutates session state; everything
//! else reads.

mod error;
mod provider;
mod session;

pub use error::IdentityError;
pub use provider::{IdentityClient, OidcClient};
pub use session::{Session, SessionSnapshot, MIN_TOKEN_VALIDITY, REFRESH_INTERVAL};
