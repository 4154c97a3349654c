use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity & Roles ---

/// User
///
/// A CMS account as seen by the API: the role is resolved to its name and its
/// current capability list. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct User {
    #[ts(type = "number")]
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub capabilities: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Role
///
/// A named bundle of capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Role {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

/// Insert payload for the repository; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
}

/// A user together with the stored bcrypt hash, used only by login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "head@school.example")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    /// HS256 bearer token.
    pub token: String,
    pub user: User,
}

/// RegisterUserRequest
///
/// Administrators create accounts; there is no self sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[schema(example = "author")]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: String,
}

// --- Posts & Pages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum PostKind {
    #[default]
    Post,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

/// Post
///
/// A row of the `posts` table. Pages share the table and are told apart by `kind`.
/// The `slug` is the public lookup key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Post {
    #[ts(type = "number")]
    pub id: i64,
    pub kind: PostKind,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    // Null once the author's account is deleted.
    #[ts(type = "number | null")]
    pub author_id: Option<i64>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub kind: PostKind,
    pub title: String,
    /// Derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
}

/// UpdatePostRequest
///
/// Partial update; only the provided fields change. An empty `featured_image` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
}

/// Fully resolved insert for the repository: slug is final, timestamps decided.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub kind: PostKind,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub author_id: i64,
    pub published_at: Option<DateTime<Utc>>,
}

/// Resolved partial update. `featured_image: Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<Option<String>>,
    pub status: Option<PostStatus>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Repository-level listing filter.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub kind: Option<PostKind>,
    pub status: Option<PostStatus>,
    pub search: Option<String>,
    pub author_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub items: Vec<Post>,
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub per_page: i64,
}

// --- Media ---

/// MediaVariant
///
/// A resized derivative of an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct MediaVariant {
    pub key: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Media
///
/// Metadata of an uploaded file. `variants` is keyed by derivative name
/// (`thumbnail`, `medium`) and is empty for non-images.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Media {
    #[ts(type = "number")]
    pub id: i64,
    pub original_name: String,
    pub storage_key: String,
    pub url: String,
    pub mime_type: String,
    #[ts(type = "number")]
    pub size_bytes: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub variants: BTreeMap<String, MediaVariant>,
    pub alt_text: String,
    #[ts(type = "number | null")]
    pub uploaded_by: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub original_name: String,
    pub storage_key: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub variants: BTreeMap<String, MediaVariant>,
    pub alt_text: String,
    pub uploaded_by: i64,
}

// --- Settings & Menus ---

/// Setting
///
/// An opaque JSON value stored under a unique key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Setting {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a check-then-insert-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct MenuItem {
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(no_recursion)]
    pub children: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Menu {
    pub name: String,
    pub items: Vec<MenuItem>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpsertMenuRequest {
    pub items: Vec<MenuItem>,
}

/// SiteResponse
///
/// Everything the public theme needs to render chrome in one request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SiteResponse {
    #[schema(value_type = Object)]
    pub settings: BTreeMap<String, Value>,
    pub menus: Vec<Menu>,
}

// --- Analytics ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TrackRequest {
    #[schema(example = "/news/sports-day")]
    pub path: String,
    #[serde(default)]
    #[ts(type = "number | null")]
    pub post_id: Option<i64>,
    #[serde(default)]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageView {
    pub path: String,
    pub post_id: Option<i64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct DayCount {
    /// `YYYY-MM-DD` in UTC.
    pub day: String,
    #[ts(type = "number")]
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct PathCount {
    pub path: String,
    #[ts(type = "number")]
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct ContentCounts {
    #[ts(type = "number")]
    pub published_posts: i64,
    #[ts(type = "number")]
    pub draft_posts: i64,
    #[ts(type = "number")]
    pub pages: i64,
    #[ts(type = "number")]
    pub media: i64,
    #[ts(type = "number")]
    pub users: i64,
}

/// AnalyticsSummary
///
/// Output of `GET /admin/analytics/summary`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AnalyticsSummary {
    #[ts(type = "number")]
    pub days: i64,
    #[ts(type = "number")]
    pub total_views: i64,
    #[ts(type = "number")]
    pub unique_paths: i64,
    pub views_by_day: Vec<DayCount>,
    pub top_paths: Vec<PathCount>,
    pub content: ContentCounts,
}
