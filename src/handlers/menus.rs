use axum::{extract::State, http::StatusCode};

use super::is_valid_key;
use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    models::{Menu, MenuItem, UpsertMenuRequest, Upserted},
};

pub const MAX_MENU_DEPTH: usize = 3;

/// Every item needs a label and a url; nesting stops at three levels.
pub fn validate_items(items: &[MenuItem]) -> ApiResult<()> {
    fn walk(items: &[MenuItem], depth: usize) -> ApiResult<()> {
        if depth > MAX_MENU_DEPTH {
            return Err(ApiError::bad_request(format!(
                "menus nest at most {MAX_MENU_DEPTH} levels deep"
            )));
        }
        for item in items {
            if item.label.trim().is_empty() {
                return Err(ApiError::bad_request("every menu item needs a label"));
            }
            if item.url.trim().is_empty() {
                return Err(ApiError::bad_request(format!(
                    "menu item {:?} needs a url",
                    item.label
                )));
            }
            if !item.children.is_empty() {
                walk(&item.children, depth + 1)?;
            }
        }
        Ok(())
    }
    walk(items, 1)
}

#[utoipa::path(
    get,
    path = "/menus",
    responses((status = 200, description = "All menus", body = [Menu]))
)]
pub async fn list_menus(State(state): State<AppState>) -> ApiResult<Json<Vec<Menu>>> {
    Ok(Json(state.repo.list_menus().await?))
}

#[utoipa::path(
    get,
    path = "/menus/{name}",
    params(("name" = String, Path, description = "Menu name, e.g. primary")),
    responses(
        (status = 200, description = "Found", body = Menu),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_menu(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Menu>> {
    state
        .repo
        .get_menu(&name)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("menu"))
}

/// put_menu
///
/// [Admin Route] Replaces the items of menu `name`, creating it when absent.
#[utoipa::path(
    put,
    path = "/admin/menus/{name}",
    params(("name" = String, Path, description = "Menu name")),
    request_body = UpsertMenuRequest,
    responses(
        (status = 200, description = "Updated", body = Menu),
        (status = 201, description = "Created", body = Menu),
        (status = 400, description = "Invalid name or items")
    )
)]
pub async fn put_menu(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<UpsertMenuRequest>,
) -> ApiResult<(StatusCode, Json<Menu>)> {
    auth.require(capability::MANAGE_MENUS)?;
    if !is_valid_key(&name) {
        return Err(ApiError::bad_request(format!("invalid menu name {name:?}")));
    }
    validate_items(&payload.items)?;

    let (menu, outcome) = state.repo.upsert_menu(&name, &payload.items).await?;
    tracing::info!("user {} {:?} menu {}", auth.id, outcome, name);
    let status = match outcome {
        Upserted::Created => StatusCode::CREATED,
        Upserted::Updated => StatusCode::OK,
    };
    Ok((status, Json(menu)))
}

#[utoipa::path(
    delete,
    path = "/admin/menus/{name}",
    params(("name" = String, Path, description = "Menu name")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_menu(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(capability::MANAGE_MENUS)?;
    if !state.repo.delete_menu(&name).await? {
        return Err(ApiError::NotFound("menu"));
    }
    tracing::info!("user {} deleted menu {}", auth.id, name);
    Ok(StatusCode::NO_CONTENT)
}
