#![allow(dead_code)]

use std::sync::Arc;

use school_cms::{
    AppState,
    auth::{self, AuthUser},
    config::{AppConfig, Env},
    db,
    models::{NewUser, User},
    repository::{RepositoryState, SqliteRepository},
    storage::{MediaStoreState, MockMediaStore},
};
use sqlx::SqlitePool;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Fresh in-memory database, mock media store and a default (local) config.
pub struct TestContext {
    pub state: AppState,
    pub repo: RepositoryState,
    pub store: MockMediaStore,
    pub pool: SqlitePool,
}

pub async fn test_context() -> TestContext {
    test_context_with(AppConfig::default(), MockMediaStore::new()).await
}

pub async fn test_context_with(config: AppConfig, store: MockMediaStore) -> TestContext {
    let pool = db::connect_in_memory()
        .await
        .expect("in-memory database should open and migrate");
    context_for(pool, config, store)
}

/// A context over an on-disk database, for tests that need several pooled connections.
pub async fn file_backed_context(path: &std::path::Path) -> TestContext {
    let pool = db::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("database file should open");
    db::migrate(&pool).await.expect("migrations should apply");
    context_for(pool, AppConfig::default(), MockMediaStore::new())
}

fn context_for(pool: SqlitePool, config: AppConfig, store: MockMediaStore) -> TestContext {
    let repo = Arc::new(SqliteRepository::new(pool.clone())) as RepositoryState;
    let state = AppState {
        repo: repo.clone(),
        media: Arc::new(store.clone()) as MediaStoreState,
        config,
    };
    TestContext {
        state,
        repo,
        store,
        pool,
    }
}

pub fn config_for(env: Env) -> AppConfig {
    AppConfig {
        env,
        ..AppConfig::default()
    }
}

/// Creates a user with `TEST_PASSWORD`. `role` is one of the seeded roles.
pub async fn create_user(repo: &RepositoryState, email: &str, role: &str) -> User {
    let password_hash = auth::hash_password(TEST_PASSWORD.to_string(), 4)
        .await
        .expect("hashing should succeed");
    repo.create_user(NewUser {
        email: email.to_string(),
        name: email.split('@').next().unwrap_or("user").to_string(),
        password_hash,
        role: role.to_string(),
    })
    .await
    .expect("user should be created")
}

pub async fn create_auth_user(repo: &RepositoryState, email: &str, role: &str) -> AuthUser {
    AuthUser::from(create_user(repo, email, role).await)
}

/// A small valid PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 255) as u8, (y % 255) as u8, 128])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("png should encode");
    buf
}
