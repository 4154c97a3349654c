use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod bootstrap;
pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod media;
pub mod models;
pub mod repository;
pub mod slug;
pub mod storage;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use config::MediaBackend;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use repository::{RepositoryState, SqliteRepository};
pub use storage::{LocalMediaStore, MediaStoreState, MockMediaStore, S3MediaStore};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::site::health, handlers::site::get_site,
        handlers::auth::login, handlers::auth::me, handlers::auth::register_user,
        handlers::users::list_users, handlers::users::update_user_role,
        handlers::users::delete_user, handlers::users::list_roles,
        handlers::posts::list_published_posts, handlers::posts::get_post_by_slug,
        handlers::posts::list_admin_posts, handlers::posts::get_admin_post,
        handlers::posts::create_post, handlers::posts::update_post, handlers::posts::delete_post,
        handlers::media::upload_media, handlers::media::list_media,
        handlers::media::get_media, handlers::media::delete_media,
        handlers::settings::list_settings, handlers::settings::get_setting,
        handlers::settings::put_setting, handlers::settings::put_settings,
        handlers::settings::delete_setting,
        handlers::menus::list_menus, handlers::menus::get_menu,
        handlers::menus::put_menu, handlers::menus::delete_menu,
        handlers::analytics::track_page_view, handlers::analytics::analytics_summary,
    ),
    components(
        schemas(
            models::User, models::Role, models::LoginRequest, models::LoginResponse,
            models::RegisterUserRequest, models::UpdateRoleRequest,
            models::PostKind, models::PostStatus, models::Post, models::PostPage,
            models::CreatePostRequest, models::UpdatePostRequest,
            models::Media, models::MediaVariant, handlers::media::MediaPage,
            handlers::media::UploadForm,
            models::Setting, models::Menu, models::MenuItem, models::UpsertMenuRequest,
            models::SiteResponse, models::TrackRequest, models::AnalyticsSummary,
            models::DayCount, models::PathCount, models::ContentCounts,
        )
    ),
    tags(
        (name = "school-cms", description = "School CMS API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, behind `Arc<dyn Repository>`.
    pub repo: RepositoryState,
    /// Where uploaded bytes live: local disk, S3 or the test mock.
    pub media: MediaStoreState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MediaStoreState {
    fn from_ref(app_state: &AppState) -> MediaStoreState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor before the handler; a failed extraction answers 401 and
/// the request goes no further.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies global and scoped middleware and registers the
/// application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let mut base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes(state.config.max_upload_bytes).route_layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        );

    // Uploaded files are served straight from disk with the filesystem backend.
    if let MediaBackend::Filesystem { upload_dir } = &state.config.media {
        base_router = base_router.nest_service("/uploads", ServeDir::new(upload_dir));
    }

    let base_router = base_router.with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
