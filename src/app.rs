use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::PortalConfig;
use crate::identity::Session;
use crate::routes::{health, menu, pages, session};

#[derive(Clone)]
pub struct AppState {
    pub session: Session,
    pub config: Arc<PortalConfig>,
}

impl AppState {
    pub fn new(session: Session, config: PortalConfig) -> Self {
        Self {
            session,
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/session", get(session::session_info))
        .route("/menu", get(menu::visible_menu));

    let auth_routes = Router::new()
        .route("/callback", get(session::callback))
        .route("/logout", get(session::logout))
        .route("/account", get(session::account));

    Router::new()
        .nest("/api", api_routes)
        .nest("/auth", auth_routes)
        .route("/pages/:name", get(pages::page))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
