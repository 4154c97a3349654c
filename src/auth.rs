use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    capability::Requirement,
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    repository::RepositoryState,
};

/// Claims
///
/// The payload of every token this service issues. Signed with HS256 and the configured
/// `JWT_SECRET`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's numeric id.
    pub sub: i64,
    /// Role name at the time of issue. Informational only; the extractor re-reads the
    /// role from the database on every request.
    pub role: String,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs a token for `user` that expires after `config.jwt_ttl_hours`.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, ApiError> {
    let now = Utc::now();
    let ttl = Duration::hours(i64::try_from(config.jwt_ttl_hours).unwrap_or(24));
    let claims = Claims {
        sub: user.id,
        role: user.role.clone(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign token: {:?}", e);
        ApiError::Internal
    })
}

/// hash_password
///
/// bcrypt is deliberately slow, so the work runs on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            tracing::error!("hash worker failed: {:?}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            tracing::error!("bcrypt hash failed: {:?}", e);
            ApiError::Internal
        })
}

/// verify_password
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| {
            tracing::error!("verify worker failed: {:?}", e);
            ApiError::Internal
        })
}

static DUMMY_HASH: tokio::sync::OnceCell<String> = tokio::sync::OnceCell::const_new();

/// A bcrypt hash of a random password, computed once per process. Logins for unknown
/// emails verify against it so they cost the same as a wrong password.
pub async fn dummy_hash(cost: u32) -> Result<&'static str, ApiError> {
    DUMMY_HASH
        .get_or_try_init(|| hash_password(uuid::Uuid::new_v4().to_string(), cost))
        .await
        .map(String::as_str)
}

/// AuthUser
///
/// The resolved identity of an authenticated request, with the capabilities of its role
/// as they are stored right now.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub capabilities: Vec<String>,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            capabilities: user.capabilities,
        }
    }
}

impl AuthUser {
    pub fn can(&self, capability: &str) -> bool {
        Requirement::all(&[capability]).is_met_by(&self.capabilities)
    }

    /// `Forbidden` unless the user holds `capability`.
    pub fn require(&self, capability: &str) -> Result<(), ApiError> {
        self.require_all(&[capability])
    }

    pub fn require_all(&self, required: &[&str]) -> Result<(), ApiError> {
        self.check(Requirement::all(required))
    }

    pub fn require_any(&self, required: &[&str]) -> Result<(), ApiError> {
        self.check(Requirement::any(required))
    }

    pub fn check(&self, requirement: Requirement<'_>) -> Result<(), ApiError> {
        if requirement.is_met_by(&self.capabilities) {
            Ok(())
        } else {
            tracing::debug!(
                "user {} does not meet {:?} of {:?}",
                self.id,
                requirement.mode,
                requirement.capabilities
            );
            Err(ApiError::Forbidden)
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: with `Env::Local`, an `x-user-id` header naming an existing user
///    authenticates the request.
/// 2. Bearer token: decoded and validated (signature and expiry).
/// 3. Database lookup: the user must still exist; role and capabilities come from the row.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let header_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok());
            if let Some(user_id) = header_id {
                if let Some(user) = repo.get_user(user_id).await.map_err(|e| {
                    tracing::error!("user lookup failed: {:?}", e);
                    ApiError::Unauthorized
                })? {
                    return Ok(user.into());
                }
            }
        }

        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            ApiError::Unauthorized
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("user lookup failed: {:?}", e);
                ApiError::Unauthorized
            })?
            .ok_or(ApiError::Unauthorized)?;

        Ok(user.into())
    }
}
