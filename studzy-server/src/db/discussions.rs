//! Course discussion queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::db::Discussion;
use studzy_common::Result;
use uuid::Uuid;

/// Top-level thread with author name and reply count
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThreadSummary {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub author_name: String,
    pub title: Option<String>,
    pub content: String,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Post with its author's display name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub discussion: Discussion,
    pub author_name: String,
}

pub async fn insert(
    pool: &SqlitePool,
    course_id: &str,
    user_id: &str,
    parent_id: Option<&str>,
    title: Option<&str>,
    content: &str,
) -> Result<Discussion> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO discussions (id, course_id, user_id, parent_id, title, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(course_id)
    .bind(user_id)
    .bind(parent_id)
    .bind(title)
    .bind(content)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let discussion = sqlx::query_as::<_, Discussion>("SELECT * FROM discussions WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(discussion)
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Discussion>> {
    let discussion = sqlx::query_as::<_, Discussion>("SELECT * FROM discussions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(discussion)
}

/// Threads of a course, newest first
pub async fn list_threads(pool: &SqlitePool, course_id: &str) -> Result<Vec<ThreadSummary>> {
    let threads = sqlx::query_as::<_, ThreadSummary>(
        r#"
        SELECT d.id, d.course_id, d.user_id, p.full_name AS author_name, d.title, d.content,
               (SELECT COUNT(*) FROM discussions r WHERE r.parent_id = d.id) AS reply_count,
               d.created_at
        FROM discussions d
        JOIN profiles p ON p.id = d.user_id
        WHERE d.course_id = ? AND d.parent_id IS NULL
        ORDER BY d.created_at DESC
        "#,
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(threads)
}

/// Replies to a thread, oldest first
pub async fn list_replies(pool: &SqlitePool, parent_id: &str) -> Result<Vec<Post>> {
    let replies = sqlx::query_as::<_, Post>(
        r#"
        SELECT d.*, p.full_name AS author_name
        FROM discussions d
        JOIN profiles p ON p.id = d.user_id
        WHERE d.parent_id = ?
        ORDER BY d.created_at ASC
        "#,
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(replies)
}

pub async fn get_post(pool: &SqlitePool, id: &str) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT d.*, p.full_name AS author_name
        FROM discussions d
        JOIN profiles p ON p.id = d.user_id
        WHERE d.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(post)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM discussions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
