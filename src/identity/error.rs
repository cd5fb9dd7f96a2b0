/// Errors produced by the identity-provider layer.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// OIDC Discovery endpoint failed or returned unexpected data.
    #[error("OIDC discovery failed: {0}")]
    DiscoveryFailed(String),

    /// JWKS fetch or parse failed.
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// Token is missing the `kid` header required for key lookup.
    #[error("token is missing the 'kid' header")]
    MissingKid,

    /// No key with the given `kid` was found in the issuer's JWKS.
    #[error("no key found for kid '{0}'")]
    KeyNotFound(String),

    /// The JWK could not be converted to a decoding key.
    #[error("invalid JWK format: {0}")]
    InvalidKeyFormat(String),

    /// JWT decode / signature verification / claims validation failed.
    #[error("token validation failed: {0}")]
    TokenRejected(String),

    /// Token endpoint call failed (code exchange or renewal).
    #[error("token endpoint error: {0}")]
    TokenEndpoint(String),

    /// Renewal failed; the session must be re-established via login.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Callback arrived without a login round trip in flight.
    #[error("no pending login to complete")]
    NoPendingLogin,

    /// Callback `state` does not match the pending login.
    #[error("login state mismatch")]
    StateMismatch,
}

impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::TokenRejected("token expired".into()),
            ErrorKind::InvalidSignature => IdentityError::TokenRejected("invalid signature".into()),
            ErrorKind::InvalidToken => IdentityError::TokenRejected("invalid token".into()),
            _ => IdentityError::TokenRejected(e.to_string()),
        }
    }
}
