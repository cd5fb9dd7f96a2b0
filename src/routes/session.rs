use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::claims::TokenClaims;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub ready: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub roles: Vec<String>,
    /// Access-token expiry, when a session is live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/api/session",
    tag = "Session",
    responses((status = 200, description = "Current session state", body = SessionResponse))
)]
pub async fn session_info(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    let snapshot = state.session.snapshot();

    let mut roles: Vec<String> = snapshot.roles().into_iter().collect();
    roles.sort();

    Ok(Json(SessionResponse {
        ready: snapshot.ready,
        authenticated: snapshot.authenticated,
        username: snapshot.username().map(str::to_string),
        roles,
        expires_at: snapshot.claims.as_ref().map(TokenClaims::expires_at),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Provider redirect target completing the login round trip.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Redirect> {
    state
        .session
        .complete_login(&params.code, &params.state)
        .await?;
    Ok(Redirect::to("/home"))
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.session.logout_url())
}

pub async fn account(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.session.account_url())
}
