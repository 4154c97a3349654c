use crate::{
    AppState,
    handlers::{analytics, media, menus, posts, settings, users},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Admin Router Module
///
/// The dashboard API, nested under `/admin` and wrapped in the authentication layer.
/// Each handler checks the capability it needs, so a role only reaches what it is
/// granted.
pub fn admin_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // --- Users & roles (manage_users) ---
        .route("/users", get(users::list_users))
        .route("/users/{id}", axum::routing::delete(users::delete_user))
        .route("/users/{id}/role", put(users::update_user_role))
        .route("/roles", get(users::list_roles))
        // --- Posts & pages ---
        .route(
            "/posts",
            get(posts::list_admin_posts).post(posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(posts::get_admin_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        // --- Media ---
        // The upload route gets its own body limit; axum's 2 MB default applies elsewhere.
        .route(
            "/media",
            get(media::list_media)
                .post(media::upload_media)
                .layer(DefaultBodyLimit::max(
                    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
                )),
        )
        .route(
            "/media/{id}",
            get(media::get_media).delete(media::delete_media),
        )
        // --- Settings (manage_settings) ---
        .route("/settings", put(settings::put_settings))
        .route(
            "/settings/{key}",
            put(settings::put_setting).delete(settings::delete_setting),
        )
        // --- Menus (manage_menus) ---
        .route(
            "/menus/{name}",
            put(menus::put_menu).delete(menus::delete_menu),
        )
        // --- Analytics (view_analytics) ---
        .route("/analytics/summary", get(analytics::analytics_summary))
}
