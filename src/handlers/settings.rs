use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode};
use serde_json::Value;

use super::is_valid_key;
use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    models::{Setting, Upserted},
};

fn check_key(key: &str) -> ApiResult<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "invalid setting key {key:?}: use 1-100 characters of A-Z a-z 0-9 _ . -"
        )))
    }
}

/// list_settings
///
/// [Public Route] Every setting as one JSON object keyed by setting key.
#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "All settings", body = Object))
)]
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, Value>>> {
    Ok(Json(state.repo.list_settings().await?))
}

#[utoipa::path(
    get,
    path = "/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Found", body = Setting),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Setting>> {
    state
        .repo
        .get_setting(&key)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("setting"))
}

/// put_setting
///
/// [Admin Route] Stores any JSON value under `key`. 201 when the key is new, 200 when an
/// existing value was replaced.
#[utoipa::path(
    put,
    path = "/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body(content = Object, description = "Any JSON value"),
    responses(
        (status = 200, description = "Updated", body = Setting),
        (status = 201, description = "Created", body = Setting),
        (status = 400, description = "Invalid key")
    )
)]
pub async fn put_setting(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> ApiResult<(StatusCode, Json<Setting>)> {
    auth.require(capability::MANAGE_SETTINGS)?;
    check_key(&key)?;

    let (setting, outcome) = state.repo.upsert_setting(&key, &value).await?;
    tracing::info!("user {} {:?} setting {}", auth.id, outcome, key);
    let status = match outcome {
        Upserted::Created => StatusCode::CREATED,
        Upserted::Updated => StatusCode::OK,
    };
    Ok((status, Json(setting)))
}

/// put_settings
///
/// [Admin Route] Bulk write. The body is an object of `key: value` pairs; all keys are
/// validated before anything is written, then applied in one transaction.
#[utoipa::path(
    put,
    path = "/admin/settings",
    request_body(content = Object, description = "Object of key/value pairs"),
    responses(
        (status = 200, description = "Written", body = [Setting]),
        (status = 400, description = "Not an object or invalid key")
    )
)]
pub async fn put_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Vec<Setting>>> {
    auth.require(capability::MANAGE_SETTINGS)?;
    let Value::Object(object) = body else {
        return Err(ApiError::bad_request("body must be a JSON object"));
    };
    let values: BTreeMap<String, Value> = object.into_iter().collect();
    for key in values.keys() {
        check_key(key)?;
    }

    let written = state.repo.upsert_settings(&values).await?;
    tracing::info!("user {} wrote {} settings", auth.id, written.len());
    Ok(Json(written))
}

#[utoipa::path(
    delete,
    path = "/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_setting(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    auth.require(capability::MANAGE_SETTINGS)?;
    if !state.repo.delete_setting(&key).await? {
        return Err(ApiError::NotFound("setting"));
    }
    tracing::info!("user {} deleted setting {}", auth.id, key);
    Ok(StatusCode::NO_CONTENT)
}
