//! Embedding storage
//!
//! Vectors are stored as little-endian `f32` BLOBs next to their chunk text.

use chrono::Utc;
use sqlx::SqlitePool;
use studzy_common::db::EmbeddingRow;
use studzy_common::Result;
use uuid::Uuid;

/// Chunk row joined with its resource title, for context assembly
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmbeddingWithSource {
    #[sqlx(flatten)]
    pub row: EmbeddingRow,
    pub resource_title: String,
}

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Returns `None` when the blob length is not a multiple of 4
pub fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Replace every chunk of a resource in one transaction
pub async fn replace_for_resource(
    pool: &SqlitePool,
    resource_id: &str,
    course_id: &str,
    chunks: &[(String, Vec<f32>)],
) -> Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM study_material_embeddings WHERE resource_id = ?")
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now();
    for (index, (content, vector)) in chunks.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO study_material_embeddings (
                id, resource_id, course_id, chunk_index, content, embedding, dimensions, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(resource_id)
        .bind(course_id)
        .bind(index as i64)
        .bind(content)
        .bind(encode_vector(vector))
        .bind(vector.len() as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(chunks.len())
}

pub async fn delete_for_resource(pool: &SqlitePool, resource_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM study_material_embeddings WHERE resource_id = ?")
        .bind(resource_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Candidate chunks for similarity search, optionally scoped to one course
pub async fn load_candidates(
    pool: &SqlitePool,
    course_id: Option<&str>,
) -> Result<Vec<EmbeddingWithSource>> {
    let base = r#"
        SELECT e.id, e.resource_id, e.course_id, e.chunk_index, e.content, e.embedding,
               e.dimensions, r.title AS resource_title
        FROM study_material_embeddings e
        JOIN resources r ON r.id = e.resource_id
    "#;

    let rows = match course_id {
        Some(course_id) => {
            sqlx::query_as::<_, EmbeddingWithSource>(&format!("{} WHERE e.course_id = ?", base))
                .bind(course_id)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, EmbeddingWithSource>(base)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}
