use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;

use super::PageWindow;
use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    models::{
        CreatePostRequest, NewPost, Post, PostChanges, PostKind, PostPage, PostQuery, PostStatus,
        UpdatePostRequest,
    },
    repository::{RepoError, RepositoryState},
    slug,
};

pub const MAX_TITLE_LEN: usize = 200;

/// How often a write is retried when a concurrent writer claims the chosen slug first.
const SLUG_ATTEMPTS: usize = 16;

/// PublicPostFilter
///
/// Query parameters of `GET /posts`. Only published rows are ever returned.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PublicPostFilter {
    /// `post` or `page`.
    pub kind: Option<PostKind>,
    /// Case-insensitive match on title, excerpt and content.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// AdminPostFilter
///
/// Query parameters of `GET /admin/posts`; drafts included.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct AdminPostFilter {
    pub kind: Option<PostKind>,
    pub status: Option<PostStatus>,
    pub search: Option<String>,
    pub author_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn validate_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::bad_request(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// unique_slug
///
/// Slugifies `source` and appends `-2`, `-3`, ... until no other post uses it.
pub async fn unique_slug(
    repo: &RepositoryState,
    source: &str,
    exclude_id: Option<i64>,
) -> ApiResult<String> {
    let base = slug::slugify(source);
    let mut n = 1;
    loop {
        let candidate = slug::candidate(&base, n);
        if !repo.slug_taken(&candidate, exclude_id).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Ownership and page rules shared by update and delete.
fn authorize_existing(auth: &AuthUser, post: &Post) -> ApiResult<()> {
    if post.kind == PostKind::Page {
        auth.require(capability::MANAGE_PAGES)?;
    }
    if post.author_id != Some(auth.id) {
        auth.require(capability::EDIT_OTHERS_POSTS)?;
    }
    Ok(())
}

async fn page_of(state: &AppState, query: PostQuery, window: PageWindow) -> ApiResult<PostPage> {
    let (items, total) = state.repo.list_posts(&query).await?;
    Ok(PostPage {
        items,
        total,
        page: window.page,
        per_page: window.per_page,
    })
}

/// list_published_posts
///
/// [Public Route] Published posts and pages, newest first.
#[utoipa::path(
    get,
    path = "/posts",
    params(PublicPostFilter),
    responses(
        (status = 200, description = "Published posts", body = PostPage),
        (status = 400, description = "Invalid pagination")
    )
)]
pub async fn list_published_posts(
    State(state): State<AppState>,
    Query(filter): Query<PublicPostFilter>,
) -> ApiResult<Json<PostPage>> {
    let window = PageWindow::new(filter.page, filter.per_page)?;
    let query = PostQuery {
        kind: filter.kind,
        status: Some(PostStatus::Published),
        search: non_blank(filter.search),
        author_id: None,
        limit: window.limit(),
        offset: window.offset(),
    };
    Ok(Json(page_of(&state, query, window).await?))
}

/// get_post_by_slug
///
/// [Public Route] A single published post or page. Drafts are reported as missing.
#[utoipa::path(
    get,
    path = "/posts/slug/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Post>> {
    state
        .repo
        .get_published_post_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

#[utoipa::path(
    get,
    path = "/admin/posts",
    params(AdminPostFilter),
    responses((status = 200, description = "All posts, drafts included", body = PostPage))
)]
pub async fn list_admin_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AdminPostFilter>,
) -> ApiResult<Json<PostPage>> {
    auth.require(capability::EDIT_POSTS)?;
    let window = PageWindow::new(filter.page, filter.per_page)?;
    let query = PostQuery {
        kind: filter.kind,
        status: filter.status,
        search: non_blank(filter.search),
        author_id: filter.author_id,
        limit: window.limit(),
        offset: window.offset(),
    };
    Ok(Json(page_of(&state, query, window).await?))
}

#[utoipa::path(
    get,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_admin_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Post>> {
    auth.require(capability::EDIT_POSTS)?;
    state
        .repo
        .get_post(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

/// create_post
///
/// [Admin Route] Requires `edit_posts`, plus `manage_pages` for pages and `publish_post`
/// when created as published. The slug comes from the payload or the title.
#[utoipa::path(
    post,
    path = "/admin/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid title"),
        (status = 403, description = "Missing capability")
    )
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    auth.require(capability::EDIT_POSTS)?;
    if payload.kind == PostKind::Page {
        auth.require(capability::MANAGE_PAGES)?;
    }
    if payload.status == PostStatus::Published {
        auth.require(capability::PUBLISH_POST)?;
    }

    let title = validate_title(&payload.title)?;
    let slug_source = non_blank(payload.slug).unwrap_or_else(|| title.clone());
    let published_at = (payload.status == PostStatus::Published).then(Utc::now);
    let draft = NewPost {
        kind: payload.kind,
        title,
        slug: String::new(),
        content: payload.content,
        excerpt: payload.excerpt,
        featured_image: non_blank(payload.featured_image),
        status: payload.status,
        author_id: auth.id,
        published_at,
    };

    // UNIQUE(slug) decides races between concurrent creates; the loser picks the next suffix.
    let mut attempt = 1;
    let post = loop {
        let slug = unique_slug(&state.repo, &slug_source, None).await?;
        match state.repo.create_post(NewPost { slug, ..draft.clone() }).await {
            Ok(post) => break post,
            Err(RepoError::Conflict(_)) if attempt < SLUG_ATTEMPTS => {
                tracing::debug!("slug for {:?} claimed concurrently, retrying", slug_source);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };

    tracing::info!("user {} created {:?} {} ({})", auth.id, post.kind, post.id, post.slug);
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Admin Route] Partial update. The slug only changes when one is supplied; a new title
/// keeps the existing URL. `published_at` is stamped the first time the post is published.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 400, description = "Invalid title"),
        (status = 403, description = "Missing capability"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    auth.require(capability::EDIT_POSTS)?;
    let existing = state
        .repo
        .get_post(id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    authorize_existing(&auth, &existing)?;

    let publishing =
        payload.status == Some(PostStatus::Published) && existing.status != PostStatus::Published;
    if publishing {
        auth.require(capability::PUBLISH_POST)?;
    }

    let title = payload.title.as_deref().map(validate_title).transpose()?;
    let requested_slug = non_blank(payload.slug);
    let published_at = (publishing && existing.published_at.is_none()).then(Utc::now);
    let changes = PostChanges {
        title,
        slug: None,
        content: payload.content,
        excerpt: payload.excerpt,
        featured_image: payload.featured_image.map(|image| non_blank(Some(image))),
        status: payload.status,
        published_at,
    };

    let mut attempt = 1;
    let post = loop {
        let slug = match &requested_slug {
            Some(requested) => Some(unique_slug(&state.repo, requested, Some(id)).await?),
            None => None,
        };
        match state.repo.update_post(id, PostChanges { slug, ..changes.clone() }).await {
            Ok(Some(post)) => break post,
            Ok(None) => return Err(ApiError::NotFound("post")),
            Err(RepoError::Conflict(_)) if requested_slug.is_some() && attempt < SLUG_ATTEMPTS => {
                tracing::debug!("slug {:?} claimed concurrently, retrying", requested_slug);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };
    tracing::info!("user {} updated post {}", auth.id, post.id);
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Missing capability"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    auth.require(capability::DELETE_POSTS)?;
    let existing = state
        .repo
        .get_post(id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    authorize_existing(&auth, &existing)?;

    if !state.repo.delete_post(id).await? {
        return Err(ApiError::NotFound("post"));
    }
    tracing::info!("user {} deleted post {}", auth.id, id);
    Ok(StatusCode::NO_CONTENT)
}
