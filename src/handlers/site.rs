use axum::extract::State;

use crate::{AppState, error::ApiResult, extract::Json, models::SiteResponse};

/// get_site
///
/// [Public Route] Settings and menus in one response, for rendering the public theme.
#[utoipa::path(
    get,
    path = "/site",
    responses((status = 200, description = "Site settings and menus", body = SiteResponse))
)]
pub async fn get_site(State(state): State<AppState>) -> ApiResult<Json<SiteResponse>> {
    let settings = state.repo.list_settings().await?;
    let menus = state.repo.list_menus().await?;
    Ok(Json(SiteResponse { settings, menus }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
