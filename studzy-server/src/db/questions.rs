//! CBT question pool queries

use chrono::Utc;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use studzy_common::db::Question;
use studzy_common::Result;
use uuid::Uuid;

/// Writable question fields
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub course_id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option: i64,
    pub explanation: Option<String>,
}

pub async fn insert_question(pool: &SqlitePool, input: &QuestionInput) -> Result<Question> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO questions (id, course_id, question_text, options, correct_option, explanation, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.course_id)
    .bind(input.question_text.trim())
    .bind(Json(&input.options))
    .bind(input.correct_option)
    .bind(&input.explanation)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(question)
}

pub async fn update_question(
    pool: &SqlitePool,
    id: &str,
    input: &QuestionInput,
) -> Result<Option<Question>> {
    let result = sqlx::query(
        r#"
        UPDATE questions
        SET course_id = ?, question_text = ?, options = ?, correct_option = ?, explanation = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.course_id)
    .bind(input.question_text.trim())
    .bind(Json(&input.options))
    .bind(input.correct_option)
    .bind(&input.explanation)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_question(pool, id).await
}

pub async fn get_question(pool: &SqlitePool, id: &str) -> Result<Option<Question>> {
    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(question)
}

pub async fn delete_question(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Full question pool for a course, in insertion order
pub async fn list_for_course(pool: &SqlitePool, course_id: &str) -> Result<Vec<Question>> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE course_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

pub async fn count_for_course(pool: &SqlitePool, course_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
