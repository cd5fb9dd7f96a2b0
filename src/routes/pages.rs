//! Guarded portal pages.
//!
//! Each page declares its allow-list once; the handler runs the route
//! guard against the current session snapshot and encodes the outcome
//! as an HTTP status, so the guard states map onto 503 (loading), 401
//! (login redirect pending), 403 (denied) and 200 (allowed).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::access::{self, roles, GuardState};
use crate::app::AppState;
use crate::config::PortalConfig;
use crate::errors::{AppError, AppResult};

/// What an allowed page renders.
#[derive(Debug, Clone, Copy)]
enum View {
    Home,
    RootConfig,
    Frame(FrameTarget),
}

/// Deployment-configured targets for embedded views.
#[derive(Debug, Clone, Copy)]
enum FrameTarget {
    AdminUi,
    Dashboards,
    ApiDocs,
    IdentityConsole,
}

impl FrameTarget {
    fn resolve(self, config: &PortalConfig) -> &str {
        match self {
            FrameTarget::AdminUi => &config.targets.admin_ui,
            FrameTarget::Dashboards => &config.targets.dashboards,
            FrameTarget::ApiDocs => &config.targets.api_docs,
            FrameTarget::IdentityConsole => &config.targets.identity_console,
        }
    }
}

struct PageRoute {
    name: &'static str,
    allowed_roles: &'static [&'static str],
    view: View,
}

/// Static route table; same role sets as the menu entries in
/// [`crate::menu::MENU`].
const PAGES: &[PageRoute] = &[
    PageRoute {
        name: "home",
        allowed_roles: &[roles::VIEWER, roles::TRADER, roles::ADMIN, roles::ROOT],
        view: View::Home,
    },
    PageRoute {
        name: "config",
        allowed_roles: &[roles::ADMIN, roles::ROOT],
        view: View::Frame(FrameTarget::AdminUi),
    },
    PageRoute {
        name: "analytics",
        allowed_roles: &[roles::VIEWER, roles::TRADER, roles::ADMIN, roles::ROOT],
        view: View::Frame(FrameTarget::Dashboards),
    },
    PageRoute {
        name: "api-docs",
        allowed_roles: &[roles::ADMIN, roles::ROOT],
        view: View::Frame(FrameTarget::ApiDocs),
    },
    PageRoute {
        name: "auth-console",
        allowed_roles: &[roles::ROOT],
        view: View::Frame(FrameTarget::IdentityConsole),
    },
    PageRoute {
        name: "root-config",
        allowed_roles: &[roles::ROOT],
        view: View::RootConfig,
    },
];

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageContent {
    Home {
        username: String,
        roles: Vec<String>,
    },
    RootConfig {
        sections: Vec<String>,
        api_docs_url: String,
        identity_console_url: String,
    },
    Frame {
        src: String,
        title: String,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PageResponse {
    pub state: GuardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Where to send the browser when the session is unauthenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    /// Escape actions offered on the denied view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<PageContent>,
}

#[utoipa::path(
    get,
    path = "/pages/{name}",
    tag = "Pages",
    params(("name" = String, Path, description = "Page name, e.g. `home`")),
    responses(
        (status = 200, description = "Page allowed", body = PageResponse),
        (status = 401, description = "Login required", body = PageResponse),
        (status = 403, description = "Access denied", body = PageResponse),
        (status = 404, description = "Unknown page"),
        (status = 503, description = "Session still initializing", body = PageResponse)
    )
)]
pub async fn page(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let route = PAGES
        .iter()
        .find(|route| route.name == name)
        .ok_or_else(|| AppError::not_found(format!("no such page: {name}")))?;

    let snapshot = state.session.snapshot();

    let response = match access::evaluate(&snapshot, route.allowed_roles) {
        GuardState::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PageResponse {
                state: GuardState::Loading,
                message: Some("session is still initializing".into()),
                login_url: None,
                account_url: None,
                logout_url: None,
                content: None,
            }),
        ),
        GuardState::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            Json(PageResponse {
                state: GuardState::Unauthenticated,
                message: Some("redirecting to login".into()),
                login_url: Some(state.session.login_url().await),
                account_url: None,
                logout_url: None,
                content: None,
            }),
        ),
        GuardState::Denied => {
            tracing::debug!(page = %route.name, "access denied");
            (
                StatusCode::FORBIDDEN,
                Json(PageResponse {
                    state: GuardState::Denied,
                    message: Some("you do not have permissions to view this page".into()),
                    login_url: None,
                    account_url: Some(state.session.account_url()),
                    logout_url: Some(state.session.logout_url()),
                    content: None,
                }),
            )
        }
        GuardState::Allowed => (
            StatusCode::OK,
            Json(PageResponse {
                state: GuardState::Allowed,
                message: None,
                login_url: None,
                account_url: None,
                logout_url: None,
                content: Some(render(route.view, &snapshot, &state.config)),
            }),
        ),
    };

    Ok(response.into_response())
}

fn render(
    view: View,
    snapshot: &crate::identity::SessionSnapshot,
    config: &PortalConfig,
) -> PageContent {
    match view {
        View::Home => {
            let mut roles: Vec<String> = snapshot.roles().into_iter().collect();
            roles.sort();
            PageContent::Home {
                username: snapshot.username().unwrap_or("user").to_string(),
                roles,
            }
        }
        View::RootConfig => PageContent::RootConfig {
            sections: vec![
                "Maps / exchange bindings".into(),
                "User & roles management".into(),
                "Global feature flags".into(),
            ],
            api_docs_url: config.targets.api_docs.clone(),
            identity_console_url: config.targets.identity_console.clone(),
        },
        View::Frame(target) => PageContent::Frame {
            src: target.resolve(config).to_string(),
            title: view_title(target).to_string(),
        },
    }
}

fn view_title(target: FrameTarget) -> &'static str {
    match target {
        FrameTarget::AdminUi => "admin-ui",
        FrameTarget::Dashboards => "dashboards",
        FrameTarget::ApiDocs => "api-docs",
        FrameTarget::IdentityConsole => "sso-console",
    }
}
