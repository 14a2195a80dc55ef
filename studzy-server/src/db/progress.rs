//! Per-resource progress queries
//!
//! Completion is sticky: once a resource is complete, later progress updates
//! change the position but never clear `completed`.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::db::UserProgress;
use studzy_common::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub course_id: String,
    pub completed: i64,
    pub total: i64,
    pub percentage: f64,
}

pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    resource_id: &str,
    progress_percent: f64,
    position_seconds: Option<f64>,
    completed: bool,
) -> Result<UserProgress> {
    let now = Utc::now();
    let completed_at = completed.then_some(now);

    sqlx::query(
        r#"
        INSERT INTO user_progress (
            user_id, resource_id, progress_percent, position_seconds, completed, completed_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, resource_id) DO UPDATE SET
            progress_percent = excluded.progress_percent,
            position_seconds = COALESCE(excluded.position_seconds, user_progress.position_seconds),
            completed = MAX(user_progress.completed, excluded.completed),
            completed_at = COALESCE(user_progress.completed_at, excluded.completed_at),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(resource_id)
    .bind(progress_percent)
    .bind(position_seconds)
    .bind(completed)
    .bind(completed_at)
    .bind(now)
    .execute(pool)
    .await?;

    let progress = sqlx::query_as::<_, UserProgress>(
        "SELECT * FROM user_progress WHERE user_id = ? AND resource_id = ?",
    )
    .bind(user_id)
    .bind(resource_id)
    .fetch_one(pool)
    .await?;
    Ok(progress)
}

pub async fn for_course(
    pool: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<CourseProgress> {
    let (completed, total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM user_progress p
             JOIN resources r ON r.id = p.resource_id
             WHERE p.user_id = ? AND r.course_id = ? AND p.completed = 1),
            (SELECT COUNT(*) FROM resources WHERE course_id = ?)
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    let percentage = if total > 0 {
        (completed as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    Ok(CourseProgress {
        course_id: course_id.to_string(),
        completed,
        total,
        percentage,
    })
}
