use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{self, AuthUser},
    capability,
    error::{ApiError, ApiResult},
    extract::Json,
    models::{LoginRequest, LoginResponse, NewUser, RegisterUserRequest, User},
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// login
///
/// [Public Route] Exchanges email and password for a bearer token. An unknown email and a
/// wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let Some(credentials) = state
        .repo
        .get_user_credentials(payload.email.trim())
        .await?
    else {
        let hash = auth::dummy_hash(state.config.bcrypt_cost).await?;
        auth::verify_password(payload.password, hash.to_string()).await?;
        return Err(ApiError::Unauthorized);
    };

    if !auth::verify_password(payload.password, credentials.password_hash).await? {
        tracing::info!("failed login for user {}", credentials.user.id);
        return Err(ApiError::Unauthorized);
    }

    let token = auth::issue_token(&state.config, &credentials.user)?;
    tracing::info!("user {} logged in", credentials.user.id);
    Ok(Json(LoginResponse {
        token,
        user: credentials.user,
    }))
}

/// me
///
/// [Authenticated Route] The current user with the capabilities of their role.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<User>> {
    let user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user))
}

/// register_user
///
/// [Admin Route] Creates an account. Requires `manage_users`.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid email, password or role"),
        (status = 403, description = "Missing manage_users"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    auth.require(capability::MANAGE_USERS)?;

    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email address is invalid"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if state.repo.get_role(&payload.role).await?.is_none() {
        return Err(ApiError::bad_request(format!("unknown role {:?}", payload.role)));
    }

    let password_hash = auth::hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(NewUser {
            email,
            name,
            password_hash,
            role: payload.role,
        })
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("email is already registered".to_string()),
            other => other,
        })?;

    tracing::info!("user {} created user {} as {}", auth.id, user.id, user.role);
    Ok((StatusCode::CREATED, Json(user)))
}
