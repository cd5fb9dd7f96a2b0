use crate::errors::AppError;

/// Connection parameters for the external identity provider.
#[derive(Debug, Clone)]
pub struct IdentityEndpoint {
    /// Base URL of the provider, e.g. `https://auth.example.com`.
    pub url: String,
    /// Realm (tenant) name within the provider.
    pub realm: String,
    /// OAuth client id registered for this portal.
    pub client_id: String,
}

impl IdentityEndpoint {
    /// Realm base, the prefix of every provider endpoint we talk to.
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.url.trim_end_matches('/'), self.realm)
    }
}

/// Named targets for the views the portal embeds. Deployment overrides
/// these per environment; the defaults match the in-cluster ingress paths.
#[derive(Debug, Clone)]
pub struct RouteTargets {
    pub admin_ui: String,
    pub dashboards: String,
    pub api_docs: String,
    pub identity_console: String,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub identity: IdentityEndpoint,
    pub targets: RouteTargets,
    /// Externally reachable URL of this portal, used to build the OIDC
    /// redirect URI and the post-logout return address.
    pub public_url: String,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let identity = IdentityEndpoint {
            url: env_or("SSO_URL", "https://auth.example.com"),
            realm: env_or("SSO_REALM", "trade-realm"),
            client_id: env_or("SSO_CLIENT_ID", "portal"),
        };

        let targets = RouteTargets {
            admin_ui: env_or("ROUTE_ADMIN_UI", "/"),
            dashboards: env_or("ROUTE_DASHBOARDS", "/dashboards/"),
            api_docs: env_or("ROUTE_API_DOCS", "/api/swagger-ui/"),
            identity_console: env_or("ROUTE_IDENTITY_CONSOLE", "/auth/"),
        };

        let public_url = env_or("PORTAL_PUBLIC_URL", "http://localhost:8000");

        let config = Self {
            identity,
            targets,
            public_url,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("SSO_URL", &self.identity.url),
            ("SSO_REALM", &self.identity.realm),
            ("SSO_CLIENT_ID", &self.identity.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::configuration(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Where the provider sends the browser back after login.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.public_url.trim_end_matches('/'))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
