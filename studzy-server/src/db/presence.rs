//! Study presence queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::db::StudyPresence;
use studzy_common::Result;

/// Presence row with the user's display name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActiveStudent {
    pub user_id: String,
    pub full_name: String,
    pub course_id: Option<String>,
    pub resource_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

pub async fn get(pool: &SqlitePool, user_id: &str) -> Result<Option<StudyPresence>> {
    let presence = sqlx::query_as::<_, StudyPresence>(
        "SELECT * FROM study_presence WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(presence)
}

/// Record a heartbeat; `started_at` is reset when `reset_start` is set
pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    course_id: Option<&str>,
    resource_id: Option<&str>,
    at: DateTime<Utc>,
    reset_start: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO study_presence (user_id, course_id, resource_id, started_at, last_seen)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            course_id = excluded.course_id,
            resource_id = excluded.resource_id,
            started_at = CASE WHEN ? THEN excluded.started_at ELSE study_presence.started_at END,
            last_seen = excluded.last_seen
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(resource_id)
    .bind(at)
    .bind(at)
    .bind(reset_start)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove the caller's presence; returns the removed row
pub async fn remove(pool: &SqlitePool, user_id: &str) -> Result<Option<StudyPresence>> {
    let presence = sqlx::query_as::<_, StudyPresence>(
        "DELETE FROM study_presence WHERE user_id = ? RETURNING *",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(presence)
}

/// Users seen at or after `since`, optionally within one course
pub async fn list_active(
    pool: &SqlitePool,
    course_id: Option<&str>,
    since: DateTime<Utc>,
) -> Result<Vec<ActiveStudent>> {
    let base = r#"
        SELECT s.user_id, p.full_name, s.course_id, s.resource_id, s.started_at, s.last_seen
        FROM study_presence s
        JOIN profiles p ON p.id = s.user_id
        WHERE s.last_seen >= ?
    "#;

    let rows = match course_id {
        Some(course_id) => {
            sqlx::query_as::<_, ActiveStudent>(&format!(
                "{} AND s.course_id = ? ORDER BY s.last_seen DESC",
                base
            ))
            .bind(since)
            .bind(course_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ActiveStudent>(&format!("{} ORDER BY s.last_seen DESC", base))
                .bind(since)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}
