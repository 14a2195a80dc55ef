//! Portal-wide counts for the admin dashboard

use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::Result;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PortalStats {
    pub profiles: i64,
    pub courses: i64,
    pub resources: i64,
    pub questions: i64,
    pub attempts: i64,
    pub chat_messages: i64,
    pub embeddings: i64,
}

pub async fn portal_stats(pool: &SqlitePool) -> Result<PortalStats> {
    let stats = sqlx::query_as::<_, PortalStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM profiles) AS profiles,
            (SELECT COUNT(*) FROM courses) AS courses,
            (SELECT COUNT(*) FROM resources) AS resources,
            (SELECT COUNT(*) FROM questions) AS questions,
            (SELECT COUNT(*) FROM attempts) AS attempts,
            (SELECT COUNT(*) FROM chat_messages) AS chat_messages,
            (SELECT COUNT(*) FROM study_material_embeddings) AS embeddings
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
