//! Activity log and daily study-time counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::db::UserActivity;
use studzy_common::time::day_key;
use studzy_common::Result;

/// Kind of tracked activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    View,
    Complete,
    Quiz,
    Chat,
    Study,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::View => "view",
            ActivityKind::Complete => "complete",
            ActivityKind::Quiz => "quiz",
            ActivityKind::Chat => "chat",
            ActivityKind::Study => "study",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct KindCount {
    pub kind: String,
    pub count: i64,
}

/// Append one activity entry dated now
pub async fn record(
    pool: &SqlitePool,
    user_id: &str,
    kind: ActivityKind,
    resource_id: Option<&str>,
    course_id: Option<&str>,
) -> Result<()> {
    record_at(pool, user_id, kind, resource_id, course_id, Utc::now()).await
}

/// Append one activity entry dated `at`
pub async fn record_at(
    pool: &SqlitePool,
    user_id: &str,
    kind: ActivityKind,
    resource_id: Option<&str>,
    course_id: Option<&str>,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_activity (user_id, kind, resource_id, course_id, day, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(resource_id)
    .bind(course_id)
    .bind(day_key(at))
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically add seconds to the day's counter; returns the day's new total
pub async fn add_study_seconds(
    pool: &SqlitePool,
    user_id: &str,
    day: &str,
    seconds: i64,
) -> Result<i64> {
    let total = sqlx::query_scalar(
        r#"
        INSERT INTO study_time_daily (user_id, day, seconds) VALUES (?, ?, ?)
        ON CONFLICT(user_id, day) DO UPDATE SET seconds = seconds + excluded.seconds
        RETURNING seconds
        "#,
    )
    .bind(user_id)
    .bind(day)
    .bind(seconds)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Distinct days with any activity or study time, ascending
pub async fn active_days(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>> {
    let days = sqlx::query_scalar(
        r#"
        SELECT day FROM user_activity WHERE user_id = ?
        UNION
        SELECT day FROM study_time_daily WHERE user_id = ? AND seconds > 0
        ORDER BY day ASC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(days)
}

pub async fn study_seconds_on(pool: &SqlitePool, user_id: &str, day: &str) -> Result<i64> {
    let seconds: Option<i64> = sqlx::query_scalar(
        "SELECT seconds FROM study_time_daily WHERE user_id = ? AND day = ?",
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;
    Ok(seconds.unwrap_or(0))
}

pub async fn total_study_seconds(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let seconds: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(seconds), 0) FROM study_time_daily WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(seconds)
}

/// Activity counts by kind on or after `since_day`
pub async fn counts_since(
    pool: &SqlitePool,
    user_id: &str,
    since_day: &str,
) -> Result<Vec<KindCount>> {
    let counts = sqlx::query_as::<_, KindCount>(
        r#"
        SELECT kind, COUNT(*) AS count FROM user_activity
        WHERE user_id = ? AND day >= ?
        GROUP BY kind ORDER BY kind
        "#,
    )
    .bind(user_id)
    .bind(since_day)
    .fetch_all(pool)
    .await?;
    Ok(counts)
}

pub async fn recent(pool: &SqlitePool, user_id: &str, limit: i64) -> Result<Vec<UserActivity>> {
    let items = sqlx::query_as::<_, UserActivity>(
        "SELECT * FROM user_activity WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(items)
}
