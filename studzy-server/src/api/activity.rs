//! Study time tracking and the activity summary

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};
use studzy_common::db::UserActivity;
use studzy_common::time::day_key;

use crate::auth::AuthUser;
use crate::db::activity::{self, ActivityKind, KindCount};
use crate::error::{ApiError, ApiResult};
use crate::services::streak::{compute_streaks, Streaks};
use crate::AppState;

/// Largest study-time increment accepted per request
pub const MAX_STUDY_SECONDS: i64 = 3600;

/// Window for the per-kind activity counts, in days including today
pub const SUMMARY_WINDOW_DAYS: u64 = 7;

pub const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct StudyTimeRequest {
    pub seconds: i64,
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StudyTimeResponse {
    pub day: String,
    pub today_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivitySummary {
    pub streak: Streaks,
    pub today_seconds: i64,
    pub total_seconds: i64,
    pub week_counts: Vec<KindCount>,
    pub recent: Vec<UserActivity>,
}

/// POST /api/activity/study-time
///
/// The first increment of a day is also logged as a `study` activity.
pub async fn add_study_time(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<StudyTimeRequest>,
) -> ApiResult<Json<StudyTimeResponse>> {
    if !(1..=MAX_STUDY_SECONDS).contains(&req.seconds) {
        return Err(ApiError::BadRequest(format!(
            "seconds must be between 1 and {}",
            MAX_STUDY_SECONDS
        )));
    }

    let now = Utc::now();
    let day = day_key(now);
    let today_seconds = activity::add_study_seconds(&state.db, user.id(), &day, req.seconds).await?;

    if today_seconds == req.seconds {
        activity::record_at(
            &state.db,
            user.id(),
            ActivityKind::Study,
            None,
            req.course_id.as_deref(),
            now,
        )
        .await?;
    }

    Ok(Json(StudyTimeResponse { day, today_seconds }))
}

/// GET /api/activity/summary
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ActivitySummary>> {
    let now = Utc::now();
    let today = now.date_naive();
    let today_key = day_key(now);

    let days = activity::active_days(&state.db, user.id()).await?;
    let streak = compute_streaks(days.iter().map(String::as_str), today);

    let since = today
        .checked_sub_days(Days::new(SUMMARY_WINDOW_DAYS - 1))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string();

    Ok(Json(ActivitySummary {
        streak,
        today_seconds: activity::study_seconds_on(&state.db, user.id(), &today_key).await?,
        total_seconds: activity::total_study_seconds(&state.db, user.id()).await?,
        week_counts: activity::counts_since(&state.db, user.id(), &since).await?,
        recent: activity::recent(&state.db, user.id(), RECENT_LIMIT).await?,
    }))
}

pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/activity/study-time", post(add_study_time))
        .route("/api/activity/summary", get(summary))
}
