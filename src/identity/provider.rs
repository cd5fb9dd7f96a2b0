use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use super::error::IdentityError;
use crate::claims::TokenClaims;
use crate::config::{IdentityEndpoint, PortalConfig};

/// The operations the session adapter consumes from an identity
/// provider. Production uses [`OidcClient`]; tests script their own
/// implementations.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Attempt to establish a session. `Ok(true)` when an existing
    /// session was resumed, `Ok(false)` when the user must be sent
    /// through the redirect-based login flow.
    async fn init(&self) -> Result<bool, IdentityError>;

    /// Renew the access token if it has less than `min_validity` left.
    /// An error here is fatal to the session.
    async fn update_token(&self, min_validity: Duration) -> Result<(), IdentityError>;

    /// Begin a redirect-based login round trip; returns the provider
    /// URL the browser must be sent to. No code after triggering this
    /// may assume the current tokens remain usable.
    async fn login(&self) -> String;

    /// Finish the redirect round trip with the authorization code.
    async fn complete_login(&self, code: &str, state: &str)
        -> Result<TokenClaims, IdentityError>;

    /// Claims of the current validated access token, if any.
    fn token_claims(&self) -> Option<TokenClaims>;

    fn logout_url(&self) -> String;

    fn account_url(&self) -> String;
}

#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
    #[serde(default)]
    end_session_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct TokenSet {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingLogin {
    state: String,
    verifier: String,
}

/// OpenID-Connect client speaking the authorization-code-with-PKCE flow
/// against a realm-style provider. Access tokens are validated against
/// the issuer's JWKS (cached, refreshed when an unknown `kid` shows up)
/// before their claims are trusted.
pub struct OidcClient {
    endpoint: IdentityEndpoint,
    redirect_uri: String,
    public_url: String,
    http: reqwest::Client,
    discovery: tokio::sync::OnceCell<DiscoveryDocument>,
    jwks_cache: tokio::sync::RwLock<HashMap<String, Jwk>>,
    tokens: tokio::sync::RwLock<Option<TokenSet>>,
    claims: RwLock<Option<TokenClaims>>,
    pending: RwLock<Option<PendingLogin>>,
}

impl OidcClient {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            endpoint: config.identity.clone(),
            redirect_uri: config.redirect_uri(),
            public_url: config.public_url.clone(),
            http: reqwest::Client::new(),
            discovery: tokio::sync::OnceCell::new(),
            jwks_cache: tokio::sync::RwLock::new(HashMap::new()),
            tokens: tokio::sync::RwLock::new(None),
            claims: RwLock::new(None),
            pending: RwLock::new(None),
        }
    }

    /// Fetch `{realm}/.well-known/openid-configuration`, once.
    async fn discovery(&self) -> Result<&DiscoveryDocument, IdentityError> {
        self.discovery
            .get_or_try_init(|| async {
                let discovery_url = format!(
                    "{}/.well-known/openid-configuration",
                    self.endpoint.realm_url()
                );
                tracing::debug!("OIDC discovery: fetching {}", discovery_url);

                let response = self.http.get(&discovery_url).send().await.map_err(|e| {
                    IdentityError::DiscoveryFailed(format!(
                        "failed to fetch '{}': {}",
                        discovery_url, e
                    ))
                })?;

                if !response.status().is_success() {
                    return Err(IdentityError::DiscoveryFailed(format!(
                        "'{}' returned status {}",
                        discovery_url,
                        response.status()
                    )));
                }

                response.json::<DiscoveryDocument>().await.map_err(|e| {
                    IdentityError::DiscoveryFailed(format!(
                        "failed to parse discovery JSON from '{}': {}",
                        discovery_url, e
                    ))
                })
            })
            .await
    }

    /// Validate an access token against the issuer JWKS and return its
    /// claims.
    async fn validate(&self, token: &str) -> Result<TokenClaims, IdentityError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(IdentityError::MissingKid)?;

        let jwk = self.get_jwk(&kid).await?;
        let decoding_key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| IdentityError::InvalidKeyFormat(e.to_string()))?;

        // Pin validation to the exact algorithm in the token header.
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.endpoint.realm_url()]);
        // Providers map `aud` differently for access tokens; the issuer
        // check plus signature is what gates trust here.
        validation.validate_aud = false;

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Look up a JWK by `kid`, refreshing the cache on miss so key
    /// rotation is handled.
    async fn get_jwk(&self, kid: &str) -> Result<Jwk, IdentityError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(jwk) = cache.get(kid) {
                return Ok(jwk.clone());
            }
        }

        self.refresh_jwks_cache().await?;

        let cache = self.jwks_cache.read().await;
        cache
            .get(kid)
            .cloned()
            .ok_or_else(|| IdentityError::KeyNotFound(kid.to_string()))
    }

    async fn refresh_jwks_cache(&self) -> Result<(), IdentityError> {
        let jwks_uri = self.discovery().await?.jwks_uri.clone();
        tracing::debug!("refreshing JWKS cache from {}", jwks_uri);

        let response = self.http.get(&jwks_uri).send().await.map_err(|e| {
            IdentityError::JwksFetchFailed(format!("failed to fetch '{}': {}", jwks_uri, e))
        })?;

        if !response.status().is_success() {
            return Err(IdentityError::JwksFetchFailed(format!(
                "'{}' returned status {}",
                jwks_uri,
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            IdentityError::JwksFetchFailed(format!("failed to parse JWKS from '{}': {}", jwks_uri, e))
        })?;

        let mut cache = self.jwks_cache.write().await;
        cache.clear();
        for jwk in jwks.keys {
            if let Some(kid) = jwk.common.key_id.clone() {
                cache.insert(kid, jwk);
            }
        }
        tracing::debug!("JWKS cache now holds {} keys", cache.len());
        Ok(())
    }

    /// POST to the token endpoint, validate the returned access token
    /// and install it as the current token set.
    async fn exchange(&self, form: &[(&str, &str)]) -> Result<TokenClaims, IdentityError> {
        let token_endpoint = self.discovery().await?.token_endpoint.clone();

        let response = self
            .http
            .post(&token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| IdentityError::TokenEndpoint(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::TokenEndpoint(format!(
                "'{}' returned status {}",
                token_endpoint,
                response.status()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::TokenEndpoint(format!("invalid token response: {e}")))?;

        let claims = self.validate(&token_response.access_token).await?;

        *self.tokens.write().await = Some(TokenSet {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
        });
        *self.claims.write().expect("claims lock poisoned") = Some(claims.clone());

        Ok(claims)
    }
}

#[async_trait]
impl IdentityClient for OidcClient {
    async fn init(&self) -> Result<bool, IdentityError> {
        // Resolve endpoints and prime the key cache up front so a
        // misconfigured or unreachable provider fails initialization
        // instead of the first login round trip.
        self.discovery().await?;
        self.refresh_jwks_cache().await?;

        // A server-side shell has no session to resume at startup; the
        // caller sends the browser through the login redirect.
        Ok(false)
    }

    async fn update_token(&self, min_validity: Duration) -> Result<(), IdentityError> {
        let remaining = self
            .token_claims()
            .map(|claims| claims.expires_in())
            .ok_or_else(|| IdentityError::RefreshFailed("no session to refresh".into()))?;

        if remaining > min_validity.as_secs() as i64 {
            return Ok(());
        }

        let refresh_token = {
            let tokens = self.tokens.read().await;
            tokens
                .as_ref()
                .and_then(|set| set.refresh_token.clone())
                .ok_or_else(|| IdentityError::RefreshFailed("no refresh token".into()))?
        };

        tracing::debug!("access token expires in {}s, renewing", remaining);
        self.exchange(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.endpoint.client_id.as_str()),
        ])
        .await
        .map_err(|e| IdentityError::RefreshFailed(e.to_string()))?;

        Ok(())
    }

    async fn login(&self) -> String {
        let state = random_token();
        let verifier = random_token();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        *self.pending.write().expect("pending lock poisoned") = Some(PendingLogin {
            state: state.clone(),
            verifier,
        });

        let authorization_endpoint = match self.discovery.get() {
            Some(doc) => doc.authorization_endpoint.clone(),
            // Discovery has not run; fall back to the conventional path.
            None => format!("{}/protocol/openid-connect/auth", self.endpoint.realm_url()),
        };

        match Url::parse_with_params(
            &authorization_endpoint,
            &[
                ("client_id", self.endpoint.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid"),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        ) {
            Ok(login_url) => login_url.into(),
            Err(e) => {
                tracing::error!("invalid authorization endpoint '{}': {}", authorization_endpoint, e);
                authorization_endpoint
            }
        }
    }

    async fn complete_login(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenClaims, IdentityError> {
        let pending = self
            .pending
            .write()
            .expect("pending lock poisoned")
            .take()
            .ok_or(IdentityError::NoPendingLogin)?;

        if pending.state != state {
            return Err(IdentityError::StateMismatch);
        }

        self.exchange(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.endpoint.client_id.as_str()),
            ("code_verifier", pending.verifier.as_str()),
        ])
        .await
    }

    fn token_claims(&self) -> Option<TokenClaims> {
        self.claims.read().expect("claims lock poisoned").clone()
    }

    fn logout_url(&self) -> String {
        let end_session = self
            .discovery
            .get()
            .and_then(|doc| doc.end_session_endpoint.clone())
            .unwrap_or_else(|| {
                format!("{}/protocol/openid-connect/logout", self.endpoint.realm_url())
            });

        match Url::parse_with_params(&end_session, &[("redirect_uri", self.public_url.as_str())]) {
            Ok(logout_url) => logout_url.into(),
            Err(_) => end_session,
        }
    }

    fn account_url(&self) -> String {
        format!("{}/account", self.endpoint.realm_url())
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
