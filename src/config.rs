use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared immutably with every handler through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string, e.g. `sqlite://cms.db`.
    pub db_url: String,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Base URL the site is reachable at; used to build public media URLs.
    pub public_base_url: String,
    // Runtime environment marker. Controls the local `x-user-id` bypass.
    pub env: Env,
    // Secret key used to sign and validate JWTs.
    pub jwt_secret: String,
    // Token lifetime in hours.
    pub jwt_ttl_hours: u64,
    // bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    // Largest accepted upload body in bytes.
    pub max_upload_bytes: usize,
    // Where uploaded media lives.
    pub media: MediaBackend,
    // First-start administrator, created only when the users table is empty.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Defines the runtime context: local development or hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// MediaBackend
///
/// Selects the `MediaStore` implementation built in `main`.
#[derive(Clone, PartialEq, Debug)]
pub enum MediaBackend {
    /// Files written under `upload_dir` and served at `/uploads`.
    Filesystem { upload_dir: String },
    /// Any S3-compatible bucket (AWS, MinIO, Supabase Storage).
    S3 {
        endpoint: String,
        region: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        public_url: String,
    },
}

const LOCAL_JWT_SECRET: &str = "school-cms-local-development-secret";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Default for AppConfig {
    /// Safe, non-panicking values for tests.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:4000".to_string(),
            public_base_url: "http://localhost:4000".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            // Lowest cost bcrypt accepts; keeps tests fast.
            bcrypt_cost: 4,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            media: MediaBackend::Filesystem {
                upload_dir: "uploads".to_string(),
            },
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and implements the **fail-fast**
    /// principle for production.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL`, `JWT_SECRET` or the S3 credentials of an
    /// S3 media backend are missing, so the service never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let required = |name: &str, local_default: &str| -> String {
            match env {
                Env::Production => env::var(name)
                    .unwrap_or_else(|_| panic!("FATAL: {name} must be set in production.")),
                Env::Local => env::var(name).unwrap_or_else(|_| local_default.to_string()),
            }
        };

        let db_url = required("DATABASE_URL", "sqlite://cms.db");
        let jwt_secret = required("JWT_SECRET", LOCAL_JWT_SECRET);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:4000".to_string())
            .trim_end_matches('/')
            .to_string();

        let media = match env::var("MEDIA_BACKEND").as_deref() {
            Ok("s3") => {
                let bucket = required("S3_BUCKET", "cms-uploads");
                let endpoint = required("S3_ENDPOINT", "http://localhost:9000");
                let public_url = env::var("S3_PUBLIC_URL")
                    .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
                MediaBackend::S3 {
                    endpoint,
                    region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                    access_key: required("S3_ACCESS_KEY", "admin"),
                    secret_key: required("S3_SECRET_KEY", "password"),
                    bucket,
                    public_url,
                }
            }
            _ => MediaBackend::Filesystem {
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            },
        };

        Self {
            db_url,
            bind_addr,
            public_base_url,
            jwt_secret,
            jwt_ttl_hours: parse_var("JWT_TTL_HOURS", 24),
            bcrypt_cost: parse_var("BCRYPT_COST", 10),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            media,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            env,
        }
    }
}

/// Reads a numeric variable, falling back to `default` when unset or malformed.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring malformed {name}={raw:?}");
            default
        }),
        Err(_) => default,
    }
}
