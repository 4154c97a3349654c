use school_cms::{
    AppState, bootstrap,
    config::{AppConfig, Env, MediaBackend},
    create_router, db,
    repository::{RepositoryState, SqliteRepository},
    storage::{LocalMediaStore, MediaStoreState, S3MediaStore},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the configured media backend.
fn media_store(config: &AppConfig) -> MediaStoreState {
    match &config.media {
        MediaBackend::Filesystem { upload_dir } => Arc::new(LocalMediaStore::new(
            upload_dir,
            &format!("{}/uploads", config.public_base_url),
        )),
        MediaBackend::S3 {
            endpoint,
            region,
            access_key,
            secret_key,
            bucket,
            public_url,
        } => Arc::new(S3MediaStore::new(
            endpoint, region, access_key, secret_key, bucket, public_url,
        )),
    }
}

/// main
///
/// Loads configuration, sets up logging, opens and migrates the database, seeds first-start
/// data, prepares the media store and serves HTTP.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration (production fails fast on missing secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise our crate at debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "school_cms=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = db::connect(&config.db_url).await.map_err(|e| {
        tracing::error!("failed to open database {}: {}", config.db_url, e);
        e
    })?;
    db::migrate(&pool).await?;
    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 4. First-start data
    bootstrap::seed_default_settings(&repo).await?;
    bootstrap::ensure_admin(&repo, &config).await?;

    // 5. Media store
    let media = media_store(&config);
    media.ensure_ready().await?;

    // 6. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        media,
        config,
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
