use crate::{
    AppState,
    handlers::{analytics, auth, menus, posts, settings, site},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Content handlers only ever return published
/// posts and pages.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Liveness check.
        .route("/health", get(site::health))
        .route("/auth/login", post(auth::login))
        // ?kind=&search=&page=&per_page=
        .route("/posts", get(posts::list_published_posts))
        .route("/posts/slug/{slug}", get(posts::get_post_by_slug))
        .route("/settings", get(settings::list_settings))
        .route("/settings/{key}", get(settings::get_setting))
        .route("/menus", get(menus::list_menus))
        .route("/menus/{name}", get(menus::get_menu))
        // Settings and menus in one round trip for the theme.
        .route("/site", get(site::get_site))
        .route("/analytics/track", post(analytics::track_page_view))
}
