//! CBT attempt history queries

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use studzy_common::db::Attempt;
use studzy_common::Result;
use uuid::Uuid;

/// Scored outcome of a completed quiz session
#[derive(Debug, Clone)]
pub struct NewAttempt<'a> {
    pub user_id: &'a str,
    pub course_id: &'a str,
    pub session_id: &'a str,
    pub score: i64,
    pub total: i64,
    pub answers: &'a BTreeMap<String, i64>,
    pub started_at: DateTime<Utc>,
}

/// Runs inside the caller's transaction
pub async fn insert_attempt(conn: &mut SqliteConnection, new: &NewAttempt<'_>) -> Result<Attempt> {
    let id = Uuid::new_v4().to_string();
    let percentage = if new.total > 0 {
        (new.score as f64 / new.total as f64) * 100.0
    } else {
        0.0
    };

    sqlx::query(
        r#"
        INSERT INTO attempts (
            id, user_id, course_id, session_id, score, total, percentage,
            answers, started_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.user_id)
    .bind(new.course_id)
    .bind(new.session_id)
    .bind(new.score)
    .bind(new.total)
    .bind(percentage)
    .bind(Json(new.answers))
    .bind(new.started_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(attempt)
}

/// Caller's attempts, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<Attempt>> {
    let attempts = match course_id {
        Some(course_id) => {
            sqlx::query_as::<_, Attempt>(
                "SELECT * FROM attempts WHERE user_id = ? AND course_id = ? ORDER BY completed_at DESC",
            )
            .bind(user_id)
            .bind(course_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Attempt>(
                "SELECT * FROM attempts WHERE user_id = ? ORDER BY completed_at DESC",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(attempts)
}
