use crate::models::{
    AnalyticsSummary, ContentCounts, DayCount, Media, MediaVariant, Menu, MenuItem, NewMedia,
    NewPost, NewUser, PageView, PathCount, Post, PostChanges, PostQuery, PostStatus, Role, Setting,
    Upserted, User, UserCredentials,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

/// RepoError
///
/// Persistence failures. Unique-constraint violations surface as `Conflict` so handlers can
/// answer 409 instead of 500.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("{0}")]
    Conflict(String),
    #[error("stored json is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepoError::Conflict("a record with that value already exists".to_string());
            }
        }
        RepoError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the storage engine stays swappable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Roles ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    // Lookup by (case-insensitive) email, including the password hash. Login only.
    async fn get_user_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn set_user_role(&self, id: i64, role: &str) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
    async fn count_users(&self) -> RepoResult<i64>;
    async fn list_roles(&self) -> RepoResult<Vec<Role>>;
    async fn get_role(&self, name: &str) -> RepoResult<Option<Role>>;

    // --- Posts & Pages ---
    // Returns the requested page and the total number of matching rows.
    async fn list_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn get_published_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>>;
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> RepoResult<bool>;
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> RepoResult<Option<Post>>;
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Media ---
    async fn create_media(&self, media: NewMedia) -> RepoResult<Media>;
    async fn get_media(&self, id: i64) -> RepoResult<Option<Media>>;
    async fn list_media(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Media>, i64)>;
    async fn delete_media(&self, id: i64) -> RepoResult<bool>;

    // --- Settings (JSON key-value) ---
    async fn list_settings(&self) -> RepoResult<BTreeMap<String, Value>>;
    async fn get_setting(&self, key: &str) -> RepoResult<Option<Setting>>;
    async fn upsert_setting(&self, key: &str, value: &Value) -> RepoResult<(Setting, Upserted)>;
    // All keys are written in one transaction; either every key lands or none does.
    async fn upsert_settings(&self, values: &BTreeMap<String, Value>) -> RepoResult<Vec<Setting>>;
    async fn delete_setting(&self, key: &str) -> RepoResult<bool>;

    // --- Menus ---
    async fn list_menus(&self) -> RepoResult<Vec<Menu>>;
    async fn get_menu(&self, name: &str) -> RepoResult<Option<Menu>>;
    async fn upsert_menu(&self, name: &str, items: &[MenuItem]) -> RepoResult<(Menu, Upserted)>;
    async fn delete_menu(&self, name: &str) -> RepoResult<bool>;

    // --- Analytics ---
    async fn record_page_view(&self, view: PageView) -> RepoResult<()>;
    async fn analytics_summary(&self, since: DateTime<Utc>) -> RepoResult<AnalyticsSummary>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row types (storage shape) ---

const USER_SELECT: &str = r#"
    SELECT u.id, u.email, u.name, r.name AS role, r.capabilities, u.created_at, u.password_hash
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

const POST_COLUMNS: &str = "id, kind, title, slug, content, excerpt, featured_image, status, \
                            author_id, published_at, created_at, updated_at";

const MEDIA_COLUMNS: &str = "id, original_name, storage_key, url, mime_type, size_bytes, width, \
                             height, variants, alt_text, uploaded_by, created_at";

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    role: String,
    capabilities: String,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl UserRow {
    fn into_credentials(self) -> UserCredentials {
        UserCredentials {
            user: User {
                id: self.id,
                email: self.email,
                name: self.name,
                capabilities: parse_capabilities(&self.role, &self.capabilities),
                role: self.role,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: String,
    capabilities: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            capabilities: parse_capabilities(&row.name, &row.capabilities),
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(FromRow)]
struct MediaRow {
    id: i64,
    original_name: String,
    storage_key: String,
    url: String,
    mime_type: String,
    size_bytes: i64,
    width: Option<i64>,
    height: Option<i64>,
    variants: String,
    alt_text: String,
    uploaded_by: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<MediaRow> for Media {
    fn from(row: MediaRow) -> Self {
        let variants: BTreeMap<String, MediaVariant> = serde_json::from_str(&row.variants)
            .unwrap_or_else(|e| {
                tracing::warn!("media {} has unreadable variants: {:?}", row.id, e);
                BTreeMap::new()
            });
        Media {
            id: row.id,
            original_name: row.original_name,
            storage_key: row.storage_key,
            url: row.url,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            width: row.width.and_then(|w| u32::try_from(w).ok()),
            height: row.height.and_then(|h| u32::try_from(h).ok()),
            variants,
            alt_text: row.alt_text,
            uploaded_by: row.uploaded_by,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SettingRow {
    key: String,
    value: String,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for Setting {
    fn from(row: SettingRow) -> Self {
        Setting {
            value: decode_value(&row.key, &row.value),
            key: row.key,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MenuRow {
    name: String,
    items: String,
    updated_at: DateTime<Utc>,
}

impl From<MenuRow> for Menu {
    fn from(row: MenuRow) -> Self {
        let items = serde_json::from_str(&row.items).unwrap_or_else(|e| {
            tracing::warn!("menu {:?} has unreadable items: {:?}", row.name, e);
            Vec::new()
        });
        Menu {
            name: row.name,
            items,
            updated_at: row.updated_at,
        }
    }
}

/// Capabilities are stored as a JSON array on the role row.
fn parse_capabilities(role: &str, raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::error!("role {:?} has malformed capabilities: {:?}", role, e);
        Vec::new()
    })
}

/// Setting values are opaque JSON; an undecodable row reads as `null`.
fn decode_value(key: &str, raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("setting {:?} holds invalid json: {:?}", key, e);
        Value::Null
    })
}

/// Escapes LIKE wildcards so user search text matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_post_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &PostQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(kind) = query.kind {
        builder.push(" AND kind = ").push_bind(kind);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(author_id) = query.author_id {
        builder.push(" AND author_id = ").push_bind(author_id);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR excerpt LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR content LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Insert-if-absent, otherwise update. Reports which branch ran.
async fn upsert_setting_in(
    conn: &mut SqliteConnection,
    key: &str,
    raw: &str,
    now: DateTime<Utc>,
) -> RepoResult<Upserted> {
    let inserted = sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) ON CONFLICT (key) DO NOTHING",
    )
    .bind(key)
    .bind(raw)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        return Ok(Upserted::Created);
    }

    sqlx::query("UPDATE settings SET value = ?, updated_at = ? WHERE key = ?")
        .bind(raw)
        .bind(now)
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(Upserted::Updated)
}

/// SqliteRepository
///
/// The concrete `Repository`, backed by a SQLite connection pool.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(&self.pool).await?)
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.into_credentials().user))
    }

    async fn get_user_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.email = ?"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserRow::into_credentials))
    }

    /// create_user
    ///
    /// Resolves the role by name inside the insert. Emails are stored lowercased; a duplicate
    /// email surfaces as `RepoError::Conflict`.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO users (email, name, password_hash, role_id, created_at, updated_at)
               VALUES (?, ?, ?, (SELECT id FROM roles WHERE name = ?), ?, ?)
               RETURNING id"#,
        )
        .bind(user.email.trim().to_lowercase())
        .bind(user.name.trim())
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get_user(id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} ORDER BY u.name, u.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.into_credentials().user).collect())
    }

    async fn set_user_role(&self, id: i64, role: &str) -> RepoResult<Option<User>> {
        let result = sqlx::query(
            "UPDATE users SET role_id = (SELECT id FROM roles WHERE name = ?), updated_at = ? WHERE id = ?",
        )
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(id).await
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        self.count("SELECT COUNT(*) FROM users").await
    }

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, capabilities FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn get_role(&self, name: &str) -> RepoResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, capabilities FROM roles WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }

    /// list_posts
    ///
    /// Builds the filter with `QueryBuilder` so every user-supplied value is bound, never
    /// interpolated. Newest publication first; drafts sort by creation time.
    async fn list_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)> {
        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_post_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        push_post_filters(&mut builder, query);
        builder
            .push(" ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok((posts, total))
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        Ok(
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// get_published_post_by_slug
    ///
    /// The public lookup: drafts are invisible here.
    async fn get_published_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        Ok(sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE slug = ? AND status = ?"
        ))
        .bind(slug)
        .bind(PostStatus::Published)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> RepoResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM posts WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(-1))
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let now = Utc::now();
        Ok(sqlx::query_as::<_, Post>(&format!(
            r#"INSERT INTO posts
                 (kind, title, slug, content, excerpt, featured_image, status, author_id,
                  published_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING {POST_COLUMNS}"#
        ))
        .bind(post.kind)
        .bind(post.title)
        .bind(post.slug)
        .bind(post.content)
        .bind(post.excerpt)
        .bind(post.featured_image)
        .bind(post.status)
        .bind(post.author_id)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?)
    }

    /// update_post
    ///
    /// Only the fields present in `changes` are written. `updated_at` always moves.
    async fn update_post(&self, id: i64, changes: PostChanges) -> RepoResult<Option<Post>> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE posts SET ");
        let mut set = builder.separated(", ");
        set.push("updated_at = ").push_bind_unseparated(Utc::now());
        if let Some(title) = changes.title {
            set.push("title = ").push_bind_unseparated(title);
        }
        if let Some(slug) = changes.slug {
            set.push("slug = ").push_bind_unseparated(slug);
        }
        if let Some(content) = changes.content {
            set.push("content = ").push_bind_unseparated(content);
        }
        if let Some(excerpt) = changes.excerpt {
            set.push("excerpt = ").push_bind_unseparated(excerpt);
        }
        if let Some(featured_image) = changes.featured_image {
            set.push("featured_image = ").push_bind_unseparated(featured_image);
        }
        if let Some(status) = changes.status {
            set.push("status = ").push_bind_unseparated(status);
        }
        if let Some(published_at) = changes.published_at {
            set.push("published_at = ").push_bind_unseparated(published_at);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {POST_COLUMNS}"));

        Ok(builder
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_media(&self, media: NewMedia) -> RepoResult<Media> {
        let variants = serde_json::to_string(&media.variants)?;
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            r#"INSERT INTO media
                 (original_name, storage_key, url, mime_type, size_bytes, width, height,
                  variants, alt_text, uploaded_by, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING {MEDIA_COLUMNS}"#
        ))
        .bind(media.original_name)
        .bind(media.storage_key)
        .bind(media.url)
        .bind(media.mime_type)
        .bind(media.size_bytes)
        .bind(media.width.map(i64::from))
        .bind(media.height.map(i64::from))
        .bind(variants)
        .bind(media.alt_text)
        .bind(media.uploaded_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_media(&self, id: i64) -> RepoResult<Option<Media>> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Media::from))
    }

    async fn list_media(&self, limit: i64, offset: i64) -> RepoResult<(Vec<Media>, i64)> {
        let total = self.count("SELECT COUNT(*) FROM media").await?;
        let rows = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((rows.into_iter().map(Media::from).collect(), total))
    }

    async fn delete_media(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_settings(&self) -> RepoResult<BTreeMap<String, Value>> {
        let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value, updated_at FROM settings")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.key.clone(), decode_value(&row.key, &row.value)))
            .collect())
    }

    async fn get_setting(&self, key: &str) -> RepoResult<Option<Setting>> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM settings WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Setting::from))
    }

    /// upsert_setting
    ///
    /// Check-then-insert-or-update, run in a single transaction. The value is encoded to JSON
    /// text here and decoded again on read; nothing else inspects it.
    async fn upsert_setting(&self, key: &str, value: &Value) -> RepoResult<(Setting, Upserted)> {
        let raw = serde_json::to_string(value)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let outcome = upsert_setting_in(&mut tx, key, &raw, now).await?;
        tx.commit().await?;

        let setting = Setting {
            key: key.to_string(),
            value: value.clone(),
            updated_at: now,
        };
        Ok((setting, outcome))
    }

    async fn upsert_settings(&self, values: &BTreeMap<String, Value>) -> RepoResult<Vec<Setting>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(values.len());
        for (key, value) in values {
            let raw = serde_json::to_string(value)?;
            upsert_setting_in(&mut tx, key, &raw, now).await?;
            saved.push(Setting {
                key: key.clone(),
                value: value.clone(),
                updated_at: now,
            });
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_setting(&self, key: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_menus(&self) -> RepoResult<Vec<Menu>> {
        let rows = sqlx::query_as::<_, MenuRow>(
            "SELECT name, items, updated_at FROM menus ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Menu::from).collect())
    }

    async fn get_menu(&self, name: &str) -> RepoResult<Option<Menu>> {
        let row = sqlx::query_as::<_, MenuRow>(
            "SELECT name, items, updated_at FROM menus WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Menu::from))
    }

    /// upsert_menu
    ///
    /// Same check-then-insert-or-update as settings, keyed by menu name.
    async fn upsert_menu(&self, name: &str, items: &[MenuItem]) -> RepoResult<(Menu, Upserted)> {
        let raw = serde_json::to_string(items)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO menus (name, items, updated_at) VALUES (?, ?, ?) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(&raw)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let outcome = if inserted.rows_affected() > 0 {
            Upserted::Created
        } else {
            sqlx::query("UPDATE menus SET items = ?, updated_at = ? WHERE name = ?")
                .bind(&raw)
                .bind(now)
                .bind(name)
                .execute(&mut *tx)
                .await?;
            Upserted::Updated
        };
        tx.commit().await?;

        let menu = Menu {
            name: name.to_string(),
            items: items.to_vec(),
            updated_at: now,
        };
        Ok((menu, outcome))
    }

    async fn delete_menu(&self, name: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM menus WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// record_page_view
    ///
    /// An unknown `post_id` is stored as NULL rather than rejected.
    async fn record_page_view(&self, view: PageView) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO page_views (path, post_id, referrer, user_agent, created_at)
               VALUES (?, (SELECT id FROM posts WHERE id = ?), ?, ?, ?)"#,
        )
        .bind(view.path)
        .bind(view.post_id)
        .bind(view.referrer)
        .bind(view.user_agent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// analytics_summary
    ///
    /// Timestamps are stored as RFC 3339 UTC text, so the first ten characters are the day
    /// and string comparison against `since` orders correctly.
    async fn analytics_summary(&self, since: DateTime<Utc>) -> RepoResult<AnalyticsSummary> {
        let total_views: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM page_views WHERE created_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let unique_paths: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT path) FROM page_views WHERE created_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        let views_by_day = sqlx::query_as::<_, DayCount>(
            r#"SELECT substr(created_at, 1, 10) AS day, COUNT(*) AS views
               FROM page_views
               WHERE created_at >= ?
               GROUP BY day
               ORDER BY day"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let top_paths = sqlx::query_as::<_, PathCount>(
            r#"SELECT path, COUNT(*) AS views
               FROM page_views
               WHERE created_at >= ?
               GROUP BY path
               ORDER BY views DESC, path ASC
               LIMIT 10"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let content = ContentCounts {
            published_posts: self
                .count("SELECT COUNT(*) FROM posts WHERE kind = 'post' AND status = 'published'")
                .await?,
            draft_posts: self
                .count("SELECT COUNT(*) FROM posts WHERE kind = 'post' AND status = 'draft'")
                .await?,
            pages: self.count("SELECT COUNT(*) FROM posts WHERE kind = 'page'").await?,
            media: self.count("SELECT COUNT(*) FROM media").await?,
            users: self.count_users().await?,
        };

        Ok(AnalyticsSummary {
            days: 0,
            total_views,
            unique_paths,
            views_by_day,
            top_paths,
            content,
        })
    }
}
