use crate::{AppState, handlers::auth};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Session routes. The `auth_middleware` layer in `create_router` rejects anonymous
/// requests before they reach these handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/auth/me", get(auth::me))
        // Account creation is admin-driven; the handler requires `manage_users`.
        .route("/auth/register", post(auth::register_user))
}
