//! Resource queries

use chrono::Utc;
use sqlx::SqlitePool;
use studzy_common::db::Resource;
use studzy_common::Result;

/// Fields for a newly uploaded resource
#[derive(Debug, Clone)]
pub struct NewResource {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub mime_type: String,
    pub storage_key: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<String>,
}

/// Lifecycle of a resource in the RAG index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Pending,
    Ingested,
    Skipped,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Pending => "pending",
            IngestStatus::Ingested => "ingested",
            IngestStatus::Skipped => "skipped",
            IngestStatus::Failed => "failed",
        }
    }
}

pub async fn insert_resource(pool: &SqlitePool, new: &NewResource) -> Result<Resource> {
    sqlx::query(
        r#"
        INSERT INTO resources (
            id, course_id, title, description, resource_type, mime_type,
            storage_key, size_bytes, uploaded_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.id)
    .bind(&new.course_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.resource_type)
    .bind(&new.mime_type)
    .bind(&new.storage_key)
    .bind(new.size_bytes)
    .bind(&new.uploaded_by)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let resource = sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?")
        .bind(&new.id)
        .fetch_one(pool)
        .await?;
    Ok(resource)
}

pub async fn get_resource(pool: &SqlitePool, id: &str) -> Result<Option<Resource>> {
    let resource = sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(resource)
}

pub async fn list_for_course(
    pool: &SqlitePool,
    course_id: &str,
    resource_type: Option<&str>,
) -> Result<Vec<Resource>> {
    let resources = match resource_type {
        Some(kind) => {
            sqlx::query_as::<_, Resource>(
                "SELECT * FROM resources WHERE course_id = ? AND resource_type = ? ORDER BY created_at ASC",
            )
            .bind(course_id)
            .bind(kind)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Resource>(
                "SELECT * FROM resources WHERE course_id = ? ORDER BY created_at ASC",
            )
            .bind(course_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(resources)
}

pub async fn count_for_course(pool: &SqlitePool, course_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Storage keys of every resource in a course (for object cleanup)
pub async fn storage_keys_for_course(pool: &SqlitePool, course_id: &str) -> Result<Vec<String>> {
    let keys = sqlx::query_scalar("SELECT storage_key FROM resources WHERE course_id = ?")
        .bind(course_id)
        .fetch_all(pool)
        .await?;
    Ok(keys)
}

/// Atomic view counter increment; returns the new count
pub async fn increment_view_count(pool: &SqlitePool, id: &str) -> Result<Option<i64>> {
    let count = sqlx::query_scalar(
        "UPDATE resources SET view_count = view_count + 1 WHERE id = ? RETURNING view_count",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(count)
}

pub async fn set_ingest_status(pool: &SqlitePool, id: &str, status: IngestStatus) -> Result<()> {
    sqlx::query("UPDATE resources SET ingest_status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_resource(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
