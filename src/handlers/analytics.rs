use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    AppState,
    auth::AuthUser,
    capability,
    error::{ApiError, ApiResult},
    extract::{Json, Query},
    models::{AnalyticsSummary, PageView, TrackRequest},
};

pub const MAX_PATH_LEN: usize = 2048;
pub const MAX_USER_AGENT_LEN: usize = 512;
pub const MAX_REFERRER_LEN: usize = 2048;
pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct SummaryQuery {
    /// Window size in days, 1..=365. Defaults to 30.
    pub days: Option<i64>,
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// track_page_view
///
/// [Public Route] Records one page view sent by the public site.
#[utoipa::path(
    post,
    path = "/analytics/track",
    request_body = TrackRequest,
    responses(
        (status = 204, description = "Recorded"),
        (status = 400, description = "Invalid path")
    )
)]
pub async fn track_page_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TrackRequest>,
) -> ApiResult<StatusCode> {
    if !payload.path.starts_with('/') {
        return Err(ApiError::bad_request("path must start with /"));
    }
    if payload.path.chars().count() > MAX_PATH_LEN {
        return Err(ApiError::bad_request(format!(
            "path must be at most {MAX_PATH_LEN} characters"
        )));
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|ua| truncate(ua, MAX_USER_AGENT_LEN));
    let referrer = payload
        .referrer
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| truncate(r, MAX_REFERRER_LEN));

    state
        .repo
        .record_page_view(PageView {
            path: payload.path,
            post_id: payload.post_id,
            referrer,
            user_agent,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/analytics/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Traffic and content totals", body = AnalyticsSummary),
        (status = 400, description = "days out of range")
    )
)]
pub async fn analytics_summary(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    auth.require(capability::VIEW_ANALYTICS)?;
    let days = query.days.unwrap_or(DEFAULT_DAYS);
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(ApiError::bad_request(format!(
            "days must be between 1 and {MAX_DAYS}"
        )));
    }

    let since = Utc::now() - Duration::days(days);
    let mut summary = state.repo.analytics_summary(since).await?;
    summary.days = days;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
