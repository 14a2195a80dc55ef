//! Persisted quiz session queries
//!
//! One row per (user, course); starting a different session replaces it.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use studzy_common::db::QuizSession;
use studzy_common::Result;

pub async fn get_session(
    pool: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<Option<QuizSession>> {
    let session = sqlx::query_as::<_, QuizSession>(
        "SELECT * FROM quiz_sessions WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Insert a fresh session, replacing whatever was stored for (user, course)
pub async fn replace_session(
    pool: &SqlitePool,
    user_id: &str,
    course_id: &str,
    session_id: &str,
    question_ids: &[String],
) -> Result<QuizSession> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO quiz_sessions (
            user_id, course_id, session_id, question_ids, answers,
            current_index, completed, started_at, updated_at
        ) VALUES (?, ?, ?, ?, '{}', 0, 0, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(session_id)
    .bind(Json(question_ids))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let session = sqlx::query_as::<_, QuizSession>(
        "SELECT * FROM quiz_sessions WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;
    Ok(session)
}

/// Persist answers and position of an in-progress session
pub async fn save_progress(
    pool: &SqlitePool,
    user_id: &str,
    course_id: &str,
    answers: &BTreeMap<String, i64>,
    current_index: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE quiz_sessions
        SET answers = ?, current_index = ?, updated_at = ?
        WHERE user_id = ? AND course_id = ? AND completed = 0
        "#,
    )
    .bind(Json(answers))
    .bind(current_index)
    .bind(Utc::now())
    .bind(user_id)
    .bind(course_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark completed; returns false when the session was already completed
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    user_id: &str,
    course_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE quiz_sessions SET completed = 1, updated_at = ?
        WHERE user_id = ? AND course_id = ? AND completed = 0
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .bind(course_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
