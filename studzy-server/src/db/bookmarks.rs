//! Bookmark queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::Result;

/// Bookmark joined with the resource it points at
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookmarkedResource {
    pub resource_id: String,
    pub course_id: String,
    pub title: String,
    pub resource_type: String,
    pub created_at: DateTime<Utc>,
}

/// Flip the bookmark state; returns the new state
pub async fn toggle(pool: &SqlitePool, user_id: &str, resource_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND resource_id = ?")
        .bind(user_id)
        .bind(resource_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let bookmarked = if removed > 0 {
        false
    } else {
        sqlx::query("INSERT INTO bookmarks (user_id, resource_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(resource_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        true
    };

    tx.commit().await?;
    Ok(bookmarked)
}

pub async fn is_bookmarked(pool: &SqlitePool, user_id: &str, resource_id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookmarks WHERE user_id = ? AND resource_id = ?",
    )
    .bind(user_id)
    .bind(resource_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<BookmarkedResource>> {
    let bookmarks = sqlx::query_as::<_, BookmarkedResource>(
        r#"
        SELECT b.resource_id, r.course_id, r.title, r.resource_type, b.created_at
        FROM bookmarks b
        JOIN resources r ON r.id = b.resource_id
        WHERE b.user_id = ?
        ORDER BY b.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(bookmarks)
}
