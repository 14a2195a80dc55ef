//! Course catalogue endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use studzy_common::db::Course;
use tracing::{info, warn};

use crate::auth::{AdminUser, AuthUser};
use crate::db::courses::{self, CourseDetail, CourseFilter, CourseInput};
use crate::db::resources;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CourseListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub search: Option<String>,
    pub level: Option<i64>,
    pub semester: Option<i64>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<Course>,
    pub total: i64,
    #[serde(flatten)]
    pub pagination: Pagination,
}

fn validate_input(input: &CourseInput) -> ApiResult<()> {
    if input.code.trim().is_empty() {
        return Err(ApiError::BadRequest("course code is required".to_string()));
    }
    if input.title.trim().is_empty() {
        return Err(ApiError::BadRequest("course title is required".to_string()));
    }
    if matches!(input.semester, Some(s) if !(1..=3).contains(&s)) {
        return Err(ApiError::BadRequest("semester must be 1, 2 or 3".to_string()));
    }
    if matches!(input.level, Some(l) if l <= 0) {
        return Err(ApiError::BadRequest("level must be positive".to_string()));
    }
    Ok(())
}

fn duplicate_code(err: studzy_common::Error, code: &str) -> ApiError {
    match err {
        studzy_common::Error::Database(ref db_err) if crate::error::is_unique_violation(db_err) => {
            ApiError::Conflict(format!("course code {} already exists", code.trim().to_uppercase()))
        }
        other => other.into(),
    }
}

/// GET /api/courses
pub async fn list_courses(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<CourseListQuery>,
) -> ApiResult<Json<CourseListResponse>> {
    let filter = CourseFilter {
        search: query.search,
        level: query.level,
        semester: query.semester,
    };

    let total = courses::count_courses(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page);
    let courses =
        courses::list_courses(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(CourseListResponse {
        courses,
        total,
        pagination,
    }))
}

/// GET /api/courses/:id
pub async fn get_course(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CourseDetail>> {
    courses::get_course_detail(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("course {}", id)))
}

/// POST /api/admin/courses
pub async fn create_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<CourseInput>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    validate_input(&input)?;
    let course = courses::create_course(&state.db, &input)
        .await
        .map_err(|e| duplicate_code(e, &input.code))?;

    info!(course_id = %course.id, code = %course.code, admin = %admin.id(), "Created course");
    Ok((StatusCode::CREATED, Json(course)))
}

/// PUT /api/admin/courses/:id
pub async fn update_course(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Json<Course>> {
    validate_input(&input)?;
    courses::update_course(&state.db, &id, &input)
        .await
        .map_err(|e| duplicate_code(e, &input.code))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("course {}", id)))
}

/// DELETE /api/admin/courses/:id
///
/// Rows cascade in the database; stored resource files are removed afterwards.
pub async fn delete_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let keys = resources::storage_keys_for_course(&state.db, &id).await?;
    if !courses::delete_course(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("course {}", id)));
    }

    for key in &keys {
        if let Err(e) = state.storage.delete(key).await {
            warn!(course_id = %id, key = %key, "Failed to delete stored object: {}", e);
        }
    }

    info!(course_id = %id, objects = keys.len(), admin = %admin.id(), "Deleted course");
    Ok(StatusCode::NO_CONTENT)
}

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/api/courses", get(list_courses))
        .route("/api/courses/:id", get(get_course))
        .route("/api/admin/courses", post(create_course))
        .route("/api/admin/courses/:id", put(update_course).delete(delete_course))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(code: &str, title: &str, semester: Option<i64>) -> CourseInput {
        CourseInput {
            code: code.to_string(),
            title: title.to_string(),
            description: None,
            level: Some(100),
            semester,
        }
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input(&input("BIO101", "Biology", Some(1))).is_ok());
        assert!(validate_input(&input(" ", "Biology", None)).is_err());
        assert!(validate_input(&input("BIO101", "", None)).is_err());
        assert!(validate_input(&input("BIO101", "Biology", Some(4))).is_err());
    }
}
