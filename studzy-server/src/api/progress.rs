//! Per-resource progress endpoints

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use studzy_common::db::UserProgress;

use crate::auth::AuthUser;
use crate::db::progress::{self, CourseProgress};
use crate::db::{courses, resources};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress_percent: f64,
    pub position_seconds: Option<f64>,
}

/// Clamp into 0..=100; non-finite input counts as 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// PUT /api/progress/:resource_id
///
/// Reaching 100% completes the resource. Completion is never undone by later
/// updates.
pub async fn update_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<UserProgress>> {
    if resources::get_resource(&state.db, &resource_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("resource {}", resource_id)));
    }

    let percent = clamp_percent(req.progress_percent);
    let position = req.position_seconds.filter(|p| p.is_finite() && *p >= 0.0);
    let progress = progress::upsert(
        &state.db,
        user.id(),
        &resource_id,
        percent,
        position,
        percent >= 100.0,
    )
    .await?;

    Ok(Json(progress))
}

/// GET /api/progress/courses/:course_id
pub async fn course_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> ApiResult<Json<CourseProgress>> {
    if courses::get_course(&state.db, &course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("course {}", course_id)));
    }
    Ok(Json(progress::for_course(&state.db, user.id(), &course_id).await?))
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/api/progress/:resource_id", put(update_progress))
        .route("/api/progress/courses/:course_id", get(course_progress))
}
