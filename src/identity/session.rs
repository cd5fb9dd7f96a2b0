use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::provider::IdentityClient;
use super::IdentityError;
use crate::claims::TokenClaims;

/// How often the refresh task wakes up.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);
/// Renew the access token once it has less validity left than this.
pub const MIN_TOKEN_VALIDITY: Duration = Duration::from_secs(30);

/// Read-only view of the session at one instant. Consumers re-read on
/// every evaluation, so a token refresh is visible to the next guard or
/// menu render.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Initialization has finished, successfully or not.
    pub ready: bool,
    pub authenticated: bool,
    pub claims: Option<TokenClaims>,
}

impl SessionSnapshot {
    pub fn roles(&self) -> HashSet<String> {
        self.claims
            .as_ref()
            .map(TokenClaims::roles)
            .unwrap_or_default()
    }

    pub fn username(&self) -> Option<&str> {
        self.claims.as_ref().map(TokenClaims::username)
    }
}

struct SessionState {
    ready: bool,
    authenticated: bool,
    claims: Option<TokenClaims>,
}

struct SessionInner {
    client: Arc<dyn IdentityClient>,
    state: RwLock<SessionState>,
    initialized: AtomicBool,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

/// Process-wide identity session.
///
/// Single-writer, many-reader: only the adapter itself mutates the
/// state, from the initialization path and the refresh task. Everything
/// else observes it through [`Session::snapshot`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(client: Arc<dyn IdentityClient>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                client,
                state: RwLock::new(SessionState {
                    ready: false,
                    authenticated: false,
                    claims: None,
                }),
                initialized: AtomicBool::new(false),
                refresh: Mutex::new(None),
            }),
        }
    }

    /// Establish the session. Runs exactly once per process; a second
    /// call is a logged no-op. Provider errors never escape: they leave
    /// the session in the ready-but-unauthenticated blocked state.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("session already initialized, ignoring repeated initialize");
            return;
        }

        match self.inner.client.init().await {
            Ok(true) => {
                let claims = self.inner.client.token_claims();
                self.set_state(true, claims);
                tracing::info!("identity session resumed");
                self.schedule_refresh(REFRESH_INTERVAL, MIN_TOKEN_VALIDITY);
            }
            Ok(false) => {
                // Login required: the HTTP surface answers with the
                // provider redirect until the callback completes.
                self.set_state(false, None);
                tracing::info!("no existing session, login redirect required");
            }
            Err(e) => {
                self.set_state(false, None);
                tracing::error!("identity session initialization failed: {}", e);
            }
        }
    }

    /// Finish a login round trip and start keeping the token alive.
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<(), IdentityError> {
        let claims = self.inner.client.complete_login(code, state).await?;
        tracing::info!(username = %claims.username(), "login completed");
        self.set_state(true, Some(claims));
        self.schedule_refresh(REFRESH_INTERVAL, MIN_TOKEN_VALIDITY);
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read().expect("session state lock poisoned");
        SessionSnapshot {
            ready: state.ready,
            authenticated: state.authenticated,
            claims: state.claims.clone(),
        }
    }

    /// Fresh provider login URL for the current navigation.
    pub async fn login_url(&self) -> String {
        self.inner.client.login().await
    }

    pub fn logout_url(&self) -> String {
        self.inner.client.logout_url()
    }

    pub fn account_url(&self) -> String {
        self.inner.client.account_url()
    }

    /// Start (or restart) the recurring refresh task. On a failed
    /// renewal the adapter triggers the provider login exactly once,
    /// drops the session to unauthenticated and stops ticking, so the
    /// stale token is never used again.
    pub fn schedule_refresh(&self, interval: Duration, min_validity: Duration) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let client = Arc::clone(&self.inner.client);

        // Create the ticker here so its schedule starts at the moment
        // the refresh is requested, not when the task is first polled.
        let mut ticker = tokio::time::interval(interval);

        let handle = tokio::spawn(async move {
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                // The owning session is gone; stop instead of refreshing
                // a destroyed session.
                let Some(inner) = weak.upgrade() else { break };

                match client.update_token(min_validity).await {
                    Ok(()) => {
                        let claims = client.token_claims();
                        let mut state =
                            inner.state.write().expect("session state lock poisoned");
                        state.claims = claims;
                    }
                    Err(e) => {
                        tracing::warn!("token refresh failed, forcing re-login: {}", e);
                        client.login().await;
                        let mut state =
                            inner.state.write().expect("session state lock poisoned");
                        state.authenticated = false;
                        state.claims = None;
                        break;
                    }
                }
            }
        });

        let mut slot = self.inner.refresh.lock().expect("refresh slot lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Tear the refresh task down. Called on shutdown; also happens
    /// implicitly when the last handle to the session is dropped.
    pub fn shutdown(&self) {
        let mut slot = self.inner.refresh.lock().expect("refresh slot lock poisoned");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    fn set_state(&self, authenticated: bool, claims: Option<TokenClaims>) {
        let mut state = self.inner.state.write().expect("session state lock poisoned");
        state.ready = true;
        state.authenticated = authenticated;
        state.claims = claims;
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.refresh.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
