use std::collections::BTreeMap;

use axum::{
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::PageWindow;
use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    media,
    models::{Media, MediaVariant, NewMedia},
    storage::MediaStoreState,
};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MediaFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema, ts_rs::TS)]
#[ts(export)]
pub struct MediaPage {
    pub items: Vec<Media>,
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub per_page: i64,
}

/// Multipart form accepted by `POST /admin/media`; documentation only.
#[derive(Debug, utoipa::ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub alt_text: Option<String>,
}

struct Upload {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// The declared content type without parameters, lowercased.
fn declared_mime(field: &Field<'_>) -> String {
    field
        .content_type()
        .and_then(|raw| raw.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Removes whatever was already written for a failed upload.
async fn discard(store: &MediaStoreState, keys: &[String]) {
    for key in keys {
        if let Err(e) = store.delete(key).await {
            tracing::warn!("failed to clean up {}: {:?}", key, e);
        }
    }
}

/// upload_media
///
/// [Admin Route] Accepts a multipart `file` (and optional `alt_text`), validates size and
/// type, stores the original and, for raster images, its derivatives.
#[utoipa::path(
    post,
    path = "/admin/media",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded", body = Media),
        (status = 400, description = "Missing file or unreadable image"),
        (status = 413, description = "Too large"),
        (status = 415, description = "Type not allowed")
    )
)]
pub async fn upload_media(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Media>)> {
    auth.require(capability::UPLOAD_MEDIA)?;
    let limit = state.config.max_upload_bytes;

    let mut upload: Option<Upload> = None;
    let mut alt_text = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = declared_mime(&field);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                upload = Some(Upload {
                    file_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("alt_text") => {
                alt_text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, limit))?
                    .trim()
                    .to_string();
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("multipart field `file` is required"))?;
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    if upload.bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge(limit));
    }
    let extension = media::extension_for(&upload.mime_type)
        .ok_or_else(|| ApiError::UnsupportedMediaType(upload.mime_type.clone()))?;

    let key = media::storage_key(Utc::now(), extension);
    let size_bytes = upload.bytes.len() as i64;

    let (width, height, derivatives) = if media::is_raster(&upload.mime_type) {
        let processed = media::process_image(upload.bytes.clone(), upload.mime_type.clone()).await?;
        (
            Some(processed.width),
            Some(processed.height),
            processed.derivatives,
        )
    } else {
        if !media::looks_like_pdf(&upload.bytes) {
            return Err(ApiError::bad_request("file content is not a PDF document"));
        }
        (None, None, Vec::new())
    };

    let mut written = Vec::with_capacity(1 + derivatives.len());
    let url = state.media.put(&key, upload.bytes, &upload.mime_type).await?;
    written.push(key.clone());

    let mut variants = BTreeMap::new();
    for derivative in derivatives {
        let variant_key = media::variant_key(&key, derivative.name);
        match state
            .media
            .put(&variant_key, derivative.bytes, &upload.mime_type)
            .await
        {
            Ok(variant_url) => {
                written.push(variant_key.clone());
                variants.insert(
                    derivative.name.to_string(),
                    MediaVariant {
                        key: variant_key,
                        url: variant_url,
                        width: derivative.width,
                        height: derivative.height,
                    },
                );
            }
            Err(e) => {
                discard(&state.media, &written).await;
                return Err(e.into());
            }
        }
    }

    let created = state
        .repo
        .create_media(NewMedia {
            original_name: upload.file_name,
            storage_key: key,
            url,
            mime_type: upload.mime_type,
            size_bytes,
            width,
            height,
            variants,
            alt_text,
            uploaded_by: auth.id,
        })
        .await;

    match created {
        Ok(media) => {
            tracing::info!(
                "user {} uploaded media {} ({} bytes, {} variants)",
                auth.id,
                media.id,
                media.size_bytes,
                media.variants.len()
            );
            Ok((StatusCode::CREATED, Json(media)))
        }
        Err(e) => {
            discard(&state.media, &written).await;
            Err(e.into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/media",
    params(MediaFilter),
    responses((status = 200, description = "Uploaded media, newest first", body = MediaPage))
)]
pub async fn list_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<MediaFilter>,
) -> ApiResult<Json<MediaPage>> {
    auth.require_any(&[capability::UPLOAD_MEDIA, capability::EDIT_POSTS])?;
    let window = PageWindow::new(filter.page, filter.per_page)?;
    let (items, total) = state
        .repo
        .list_media(window.limit(), window.offset())
        .await?;
    Ok(Json(MediaPage {
        items,
        total,
        page: window.page,
        per_page: window.per_page,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/media/{id}",
    params(("id" = i64, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Found", body = Media),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Media>> {
    auth.require_any(&[capability::UPLOAD_MEDIA, capability::EDIT_POSTS])?;
    state
        .repo
        .get_media(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("media"))
}

/// delete_media
///
/// [Admin Route] Removes the original and its derivatives from the store, then the row.
/// Store failures are logged; the row is removed regardless.
#[utoipa::path(
    delete,
    path = "/admin/media/{id}",
    params(("id" = i64, Path, description = "Media ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    auth.require(capability::DELETE_MEDIA)?;
    let media = state
        .repo
        .get_media(id)
        .await?
        .ok_or(ApiError::NotFound("media"))?;

    let keys: Vec<String> = std::iter::once(media.storage_key.clone())
        .chain(media.variants.values().map(|v| v.key.clone()))
        .collect();

    // The row goes first; objects are removed afterwards.
    if !state.repo.delete_media(id).await? {
        return Err(ApiError::NotFound("media"));
    }
    discard(&state.media, &keys).await;
    tracing::info!("user {} deleted media {}", auth.id, id);
    Ok(StatusCode::NO_CONTENT)
}
