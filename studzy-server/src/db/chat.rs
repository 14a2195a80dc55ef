//! Chat session and message queries

use chrono::Utc;
use sqlx::SqlitePool;
use studzy_common::db::{ChatMessage, ChatSession};
use studzy_common::Result;
use uuid::Uuid;

/// Title given to sessions until the first user message renames them
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

pub async fn create_session(
    pool: &SqlitePool,
    user_id: &str,
    course_id: Option<&str>,
    title: Option<&str>,
) -> Result<ChatSession> {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO chat_sessions (id, user_id, course_id, title, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(course_id)
    .bind(title.unwrap_or(DEFAULT_SESSION_TITLE))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let session = sqlx::query_as::<_, ChatSession>("SELECT * FROM chat_sessions WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(session)
}

/// Session owned by `user_id`; other users' sessions are invisible
pub async fn get_session(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<ChatSession>> {
    let session = sqlx::query_as::<_, ChatSession>(
        "SELECT * FROM chat_sessions WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Caller's sessions, most recently active first
pub async fn list_sessions(
    pool: &SqlitePool,
    user_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<ChatSession>> {
    let sessions = match course_id {
        Some(course_id) => {
            sqlx::query_as::<_, ChatSession>(
                "SELECT * FROM chat_sessions WHERE user_id = ? AND course_id = ? ORDER BY updated_at DESC",
            )
            .bind(user_id)
            .bind(course_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ChatSession>(
                "SELECT * FROM chat_sessions WHERE user_id = ? ORDER BY updated_at DESC",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(sessions)
}

pub async fn rename_session(pool: &SqlitePool, id: &str, title: &str) -> Result<()> {
    sqlx::query("UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_session(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_session(pool: &SqlitePool, id: &str, user_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_message(
    pool: &SqlitePool,
    session_id: &str,
    role: &str,
    content: &str,
) -> Result<ChatMessage> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO chat_messages (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(session_id)
    .bind(role)
    .bind(content)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let message = sqlx::query_as::<_, ChatMessage>("SELECT * FROM chat_messages WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(message)
}

/// All messages of a session in chronological order
pub async fn list_messages(pool: &SqlitePool, session_id: &str) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

/// Last `limit` messages of a session, returned oldest first
pub async fn recent_messages(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>> {
    let mut messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT * FROM chat_messages WHERE session_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    messages.reverse();
    Ok(messages)
}

pub async fn count_user_messages(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_messages WHERE session_id = ? AND role = 'user'",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
