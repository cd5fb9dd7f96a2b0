use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use portal_gate::claims::TokenClaims;
use portal_gate::identity::{IdentityClient, IdentityError, Session};

fn claims_with(role_names: &[&str]) -> TokenClaims {
    serde_json::from_value(serde_json::json!({
        "sub": "subject",
        "exp": 2_000_000_000u64,
        "preferred_username": "ada",
        "realm_access": {"roles": role_names}
    }))
    .expect("claims must deserialize")
}

/// Scripted provider: `init` and each `update_token` tick pop their
/// results from queues, call counts are recorded.
struct ScriptedClient {
    init_result: Mutex<Option<Result<bool, IdentityError>>>,
    update_results: Mutex<VecDeque<Result<(), IdentityError>>>,
    claims: RwLock<Option<TokenClaims>>,
    init_calls: AtomicUsize,
    update_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(init_result: Result<bool, IdentityError>, claims: Option<TokenClaims>) -> Self {
        Self {
            init_result: Mutex::new(Some(init_result)),
            update_results: Mutex::new(VecDeque::new()),
            claims: RwLock::new(claims),
            init_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
        }
    }

    fn script_update(&self, result: Result<(), IdentityError>) {
        self.update_results.lock().unwrap().push_back(result);
    }

    fn set_claims(&self, claims: Option<TokenClaims>) {
        *self.claims.write().unwrap() = claims;
    }
}

#[async_trait]
impl IdentityClient for ScriptedClient {
    async fn init(&self) -> Result<bool, IdentityError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.init_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(false))
    }

    async fn update_token(&self, _min_validity: Duration) -> Result<(), IdentityError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.update_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn login(&self) -> String {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        "https://auth.example.com/login".to_string()
    }

    async fn complete_login(
        &self,
        _code: &str,
        _state: &str,
    ) -> Result<TokenClaims, IdentityError> {
        let claims = claims_with(&["viewer"]);
        self.set_claims(Some(claims.clone()));
        Ok(claims)
    }

    fn token_claims(&self) -> Option<TokenClaims> {
        self.claims.read().unwrap().clone()
    }

    fn logout_url(&self) -> String {
        "https://auth.example.com/logout".to_string()
    }

    fn account_url(&self) -> String {
        "https://auth.example.com/account".to_string()
    }
}

/// Let the paused runtime run pending tasks, then move the clock.
async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn successful_init_produces_an_authenticated_session() {
    let client = Arc::new(ScriptedClient::new(Ok(true), Some(claims_with(&["trader"]))));
    let session = Session::new(client.clone());

    session.initialize().await;

    let snapshot = session.snapshot();
    assert!(snapshot.ready);
    assert!(snapshot.authenticated);
    assert!(snapshot.roles().contains("trader"));
    assert_eq!(snapshot.username(), Some("ada"));
    session.shutdown();
}

#[tokio::test]
async fn failed_init_leaves_a_ready_blocked_session() {
    let client = Arc::new(ScriptedClient::new(
        Err(IdentityError::DiscoveryFailed("provider unreachable".into())),
        None,
    ));
    let session = Session::new(client.clone());

    session.initialize().await;

    let snapshot = session.snapshot();
    assert!(snapshot.ready);
    assert!(!snapshot.authenticated);
    assert!(snapshot.claims.is_none());
}

#[tokio::test]
async fn initialize_runs_exactly_once() {
    let client = Arc::new(ScriptedClient::new(Ok(true), Some(claims_with(&["viewer"]))));
    let session = Session::new(client.clone());

    session.initialize().await;
    session.initialize().await;

    assert_eq!(client.init_calls.load(Ordering::SeqCst), 1);
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn refresh_is_not_scheduled_when_init_requires_login() {
    let client = Arc::new(ScriptedClient::new(Ok(false), None));
    let session = Session::new(client.clone());

    session.initialize().await;
    advance(Duration::from_secs(120)).await;

    assert_eq!(client.update_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_forces_login_once_and_stops_ticking() {
    let client = Arc::new(ScriptedClient::new(Ok(true), Some(claims_with(&["viewer"]))));
    client.script_update(Err(IdentityError::RefreshFailed("refresh token expired".into())));
    let session = Session::new(client.clone());

    session.initialize().await;
    advance(Duration::from_secs(16)).await;

    assert_eq!(client.update_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.login_calls.load(Ordering::SeqCst), 1);

    let snapshot = session.snapshot();
    assert!(!snapshot.authenticated);
    assert!(snapshot.claims.is_none());

    // No further tick uses the stale token.
    advance(Duration::from_secs(120)).await;
    assert_eq!(client.update_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn successful_refresh_updates_the_visible_role_set() {
    let client = Arc::new(ScriptedClient::new(Ok(true), Some(claims_with(&["viewer"]))));
    let session = Session::new(client.clone());

    session.initialize().await;
    assert!(session.snapshot().roles().contains("viewer"));

    // The provider hands out a token with different roles on renewal.
    client.set_claims(Some(claims_with(&["viewer", "trader"])));
    advance(Duration::from_secs(16)).await;

    assert!(session.snapshot().roles().contains("trader"));
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_refresh_timer() {
    let client = Arc::new(ScriptedClient::new(Ok(true), Some(claims_with(&["viewer"]))));
    let session = Session::new(client.clone());

    session.initialize().await;
    session.shutdown();

    advance(Duration::from_secs(120)).await;
    assert_eq!(client.update_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completing_login_authenticates_and_records_claims() {
    let client = Arc::new(ScriptedClient::new(Ok(false), None));
    let session = Session::new(client.clone());

    session.initialize().await;
    assert!(!session.snapshot().authenticated);

    session
        .complete_login("auth-code", "state-token")
        .await
        .expect("scripted login must succeed");

    let snapshot = session.snapshot();
    assert!(snapshot.authenticated);
    assert!(snapshot.roles().contains("viewer"));
    session.shutdown();
}
