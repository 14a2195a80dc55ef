//! Course queries

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use studzy_common::db::Course;
use studzy_common::Result;
use uuid::Uuid;

/// Listing filters for `GET /api/courses`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    /// Case-insensitive match on code or title
    pub search: Option<String>,
    pub level: Option<i64>,
    pub semester: Option<i64>,
}

/// Writable course fields
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub level: Option<i64>,
    pub semester: Option<i64>,
}

/// Course with content counts for the detail page
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub resource_count: i64,
    pub question_count: i64,
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a CourseFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim().to_lowercase());
        builder
            .push(" AND (LOWER(code) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(title) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(level) = filter.level {
        builder.push(" AND level = ").push_bind(level);
    }
    if let Some(semester) = filter.semester {
        builder.push(" AND semester = ").push_bind(semester);
    }
}

pub async fn count_courses(pool: &SqlitePool, filter: &CourseFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM courses");
    push_filters(&mut builder, filter);
    let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

pub async fn list_courses(
    pool: &SqlitePool,
    filter: &CourseFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Course>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM courses");
    push_filters(&mut builder, filter);
    builder
        .push(" ORDER BY code ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let courses = builder.build_query_as::<Course>().fetch_all(pool).await?;
    Ok(courses)
}

pub async fn get_course(pool: &SqlitePool, id: &str) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(course)
}

pub async fn get_course_detail(pool: &SqlitePool, id: &str) -> Result<Option<CourseDetail>> {
    let Some(course) = get_course(pool, id).await? else {
        return Ok(None);
    };

    let (resource_count, question_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM resources WHERE course_id = ?),
            (SELECT COUNT(*) FROM questions WHERE course_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(Some(CourseDetail {
        course,
        resource_count,
        question_count,
    }))
}

pub async fn create_course(pool: &SqlitePool, input: &CourseInput) -> Result<Course> {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO courses (id, code, title, description, level, semester, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(input.code.trim().to_uppercase())
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.level)
    .bind(input.semester)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(course)
}

/// Returns `None` when the course does not exist
pub async fn update_course(
    pool: &SqlitePool,
    id: &str,
    input: &CourseInput,
) -> Result<Option<Course>> {
    let result = sqlx::query(
        r#"
        UPDATE courses
        SET code = ?, title = ?, description = ?, level = ?, semester = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.code.trim().to_uppercase())
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.level)
    .bind(input.semester)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_course(pool, id).await
}

pub async fn delete_course(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
