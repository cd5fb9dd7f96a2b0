use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::menu;

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuItemResponse {
    pub path: String,
    pub label: String,
}

#[utoipa::path(
    get,
    path = "/api/menu",
    tag = "Menu",
    responses((status = 200, description = "Menu entries visible to the current session", body = [MenuItemResponse]))
)]
pub async fn visible_menu(State(state): State<AppState>) -> AppResult<Json<Vec<MenuItemResponse>>> {
    let snapshot = state.session.snapshot();
    let roles = snapshot.roles();

    let entries = menu::visible(menu::MENU, &roles)
        .into_iter()
        .map(|entry| MenuItemResponse {
            path: entry.path.to_string(),
            label: entry.label.to_string(),
        })
        .collect();

    Ok(Json(entries))
}
