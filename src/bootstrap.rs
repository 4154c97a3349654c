//! First-start seeding: default settings and the initial administrator.

use serde_json::{Value, json};

use crate::{
    auth,
    config::AppConfig,
    error::{ApiError, ApiResult},
    handlers::auth::MIN_PASSWORD_LEN,
    models::{NewUser, User},
    repository::RepositoryState,
};

/// Settings the public theme expects to exist.
pub fn default_settings() -> Vec<(&'static str, Value)> {
    vec![
        ("site_title", json!("Our School")),
        ("site_tagline", json!("Learning together")),
        (
            "theme",
            json!({ "primary_color": "#1e3a8a", "secondary_color": "#f59e0b", "font": "Inter" }),
        ),
        (
            "hero",
            json!({
                "heading": "Welcome to Our School",
                "subheading": "A caring community where every learner thrives.",
                "image": null,
                "cta_label": "Find out more",
                "cta_url": "/about"
            }),
        ),
        (
            "features",
            json!([
                { "title": "Academics", "text": "A broad and ambitious curriculum." },
                { "title": "Pastoral care", "text": "Support for every pupil." },
                { "title": "Enrichment", "text": "Clubs, sport and the arts." }
            ]),
        ),
        ("logo", json!(null)),
    ]
}

/// Inserts each default setting whose key is absent. Returns how many were written.
pub async fn seed_default_settings(repo: &RepositoryState) -> ApiResult<usize> {
    let mut seeded = 0;
    for (key, value) in default_settings() {
        if repo.get_setting(key).await?.is_none() {
            repo.upsert_setting(key, &value).await?;
            seeded += 1;
        }
    }
    if seeded > 0 {
        tracing::info!("seeded {} default settings", seeded);
    }
    Ok(seeded)
}

/// ensure_admin
///
/// Creates an `admin` account from `ADMIN_EMAIL`/`ADMIN_PASSWORD` when the users table is
/// empty. Does nothing once any account exists.
pub async fn ensure_admin(repo: &RepositoryState, config: &AppConfig) -> ApiResult<Option<User>> {
    if repo.count_users().await? > 0 {
        return Ok(None);
    }
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::warn!("no users exist; set ADMIN_EMAIL and ADMIN_PASSWORD to create one");
        return Ok(None);
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        tracing::error!("ADMIN_PASSWORD must be at least {} characters", MIN_PASSWORD_LEN);
        return Err(ApiError::bad_request("ADMIN_PASSWORD is too short"));
    }

    let password_hash = auth::hash_password(password.clone(), config.bcrypt_cost).await?;
    let user = repo
        .create_user(NewUser {
            email: email.trim().to_lowercase(),
            name: "Administrator".to_string(),
            password_hash,
            role: "admin".to_string(),
        })
        .await?;
    tracing::info!("created initial administrator {}", user.email);
    Ok(Some(user))
}
