use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    models::{Role, UpdateRoleRequest, User},
};

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    auth.require(capability::MANAGE_USERS)?;
    Ok(Json(state.repo.list_users().await?))
}

/// update_user_role
///
/// [Admin Route] Moves a user to another role. Users cannot change their own role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Unknown role or own account"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    auth.require(capability::MANAGE_USERS)?;
    if id == auth.id {
        return Err(ApiError::bad_request("you cannot change your own role"));
    }
    if state.repo.get_role(&payload.role).await?.is_none() {
        return Err(ApiError::bad_request(format!("unknown role {:?}", payload.role)));
    }

    let user = state
        .repo
        .set_user_role(id, &payload.role)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    tracing::info!("user {} moved user {} to {}", auth.id, id, user.role);
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Removes an account. Content it authored stays, with a null author.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Own account"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    auth.require(capability::MANAGE_USERS)?;
    if id == auth.id {
        return Err(ApiError::bad_request("you cannot delete your own account"));
    }
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("user"));
    }
    tracing::info!("user {} deleted user {}", auth.id, id);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/roles",
    responses((status = 200, description = "Roles and their capabilities", body = [Role]))
)]
pub async fn list_roles(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    auth.require(capability::MANAGE_USERS)?;
    Ok(Json(state.repo.list_roles().await?))
}
