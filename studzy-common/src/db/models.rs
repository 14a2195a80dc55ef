//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::BTreeMap;

/// Access role stored on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// User profile; `password_hash` is never serialized
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub level: Option<i64>,
    pub semester: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded course resource (PDF, video, audio or text document)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub mime_type: String,
    pub storage_key: String,
    pub size_bytes: i64,
    pub view_count: i64,
    pub ingest_status: String,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Multiple-choice CBT question
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: String,
    pub course_id: String,
    pub question_text: String,
    pub options: Json<Vec<String>>,
    pub correct_option: i64,
    pub explanation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted quiz session for one (user, course) pair
///
/// `question_ids` fixes the question order for the life of the session.
/// `answers` maps question id to the chosen option index.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizSession {
    pub user_id: String,
    pub course_id: String,
    pub session_id: String,
    pub question_ids: Json<Vec<String>>,
    pub answers: Json<BTreeMap<String, i64>>,
    pub current_index: i64,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub session_id: String,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub answers: Json<BTreeMap<String, i64>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    /// `"user"`, `"assistant"`, or `"system"`.
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One embedded chunk of a resource's text
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmbeddingRow {
    pub id: String,
    pub resource_id: String,
    pub course_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<u8>,
    pub dimensions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bookmark {
    pub user_id: String,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Discussion {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserActivity {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub resource_id: Option<String>,
    pub course_id: Option<String>,
    pub day: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProgress {
    pub user_id: String,
    pub resource_id: String,
    pub progress_percent: f64,
    pub position_seconds: Option<f64>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudyPresence {
    pub user_id: String,
    pub course_id: Option<String>,
    pub resource_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
