use school_cms::{
    AppConfig,
    config::{Env, MediaBackend},
};
use serial_test::serial;
use std::{env, panic};

const CONFIG_VARS: &[&str] = &[
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "JWT_TTL_HOURS",
    "BIND_ADDR",
    "PUBLIC_BASE_URL",
    "UPLOAD_DIR",
    "MAX_UPLOAD_BYTES",
    "MEDIA_BACKEND",
    "S3_ENDPOINT",
    "S3_REGION",
    "S3_ACCESS_KEY",
    "S3_SECRET_KEY",
    "S3_BUCKET",
    "S3_PUBLIC_URL",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
    "BCRYPT_COST",
];

/// Clears every config variable, applies `vars`, runs `test` and restores the original
/// environment even if `test` panics.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

#[test]
#[serial]
fn test_local_defaults() {
    let config = run_with_env(&[("APP_ENV", "local")], AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "sqlite://cms.db");
    assert_eq!(config.bind_addr, "0.0.0.0:4000");
    assert_eq!(config.public_base_url, "http://localhost:4000");
    assert_eq!(config.jwt_ttl_hours, 24);
    assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    assert_eq!(
        config.media,
        MediaBackend::Filesystem {
            upload_dir: "uploads".to_string()
        }
    );
    assert!(!config.jwt_secret.is_empty());
    assert!(config.admin_email.is_none());
}

#[test]
#[serial]
fn test_unset_app_env_means_local() {
    let config = run_with_env(&[], AppConfig::load);
    assert_eq!(config.env, Env::Local);
}

#[test]
#[serial]
fn test_production_fail_fast_without_secrets() {
    let result = run_with_env(&[("APP_ENV", "production")], || {
        panic::catch_unwind(AppConfig::load)
    });
    assert!(
        result.is_err(),
        "Production config loading should panic on missing secrets"
    );
}

#[test]
#[serial]
fn test_production_with_secrets() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/cms/cms.db"),
            ("JWT_SECRET", "a-long-production-secret"),
            ("PUBLIC_BASE_URL", "https://school.example/"),
            ("JWT_TTL_HOURS", "8"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "a-long-production-secret");
    assert_eq!(config.jwt_ttl_hours, 8);
    // Trailing slash trimmed so URLs can be joined with '/'.
    assert_eq!(config.public_base_url, "https://school.example");
}

#[test]
#[serial]
fn test_s3_backend_in_production_requires_credentials() {
    let result = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite://cms.db"),
            ("JWT_SECRET", "secret"),
            ("MEDIA_BACKEND", "s3"),
            ("S3_BUCKET", "media"),
            ("S3_ENDPOINT", "https://s3.example"),
        ],
        || panic::catch_unwind(AppConfig::load),
    );
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_s3_backend_local_defaults() {
    let config = run_with_env(&[("MEDIA_BACKEND", "s3")], AppConfig::load);
    match config.media {
        MediaBackend::S3 {
            endpoint,
            bucket,
            public_url,
            ..
        } => {
            assert_eq!(endpoint, "http://localhost:9000");
            assert_eq!(public_url, format!("{endpoint}/{bucket}"));
        }
        other => panic!("expected S3 backend, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_malformed_numbers_fall_back() {
    let config = run_with_env(
        &[("MAX_UPLOAD_BYTES", "lots"), ("JWT_TTL_HOURS", "-3")],
        AppConfig::load,
    );
    assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    assert_eq!(config.jwt_ttl_hours, 24);
}

#[test]
fn test_default_is_safe_for_tests() {
    let config = AppConfig::default();
    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "sqlite::memory:");
    assert_eq!(config.bcrypt_cost, 4);
}
