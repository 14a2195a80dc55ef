//! Course discussion boards
//!
//! Threads are one level deep: a post is either a top-level thread (with a
//! title) or a reply to a thread of the same course.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use studzy_common::db::Discussion;
use studzy_common::events::StudyEvent;
use tracing::info;

use crate::auth::AuthUser;
use crate::db::courses;
use crate::db::discussions::{self, Post, ThreadSummary};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct NewPostRequest {
    pub title: Option<String>,
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    #[serde(flatten)]
    pub thread: Post,
    pub replies: Vec<Post>,
}

/// GET /api/courses/:id/discussions
pub async fn list_threads(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Vec<ThreadSummary>>> {
    if courses::get_course(&state.db, &course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("course {}", course_id)));
    }
    Ok(Json(discussions::list_threads(&state.db, &course_id).await?))
}

/// GET /api/discussions/:id
pub async fn get_thread(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ThreadResponse>> {
    let thread = discussions::get_post(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("discussion {}", id)))?;
    let replies = discussions::list_replies(&state.db, &id).await?;
    Ok(Json(ThreadResponse { thread, replies }))
}

/// POST /api/courses/:id/discussions
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<NewPostRequest>,
) -> ApiResult<(StatusCode, Json<Discussion>)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }
    if courses::get_course(&state.db, &course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("course {}", course_id)));
    }

    let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if let Some(title) = title {
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ApiError::BadRequest(format!(
                "titles are limited to {} characters",
                MAX_TITLE_CHARS
            )));
        }
    }

    match req.parent_id.as_deref() {
        Some(parent_id) => {
            let parent = discussions::get(&state.db, parent_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("discussion {}", parent_id)))?;
            if parent.course_id != course_id {
                return Err(ApiError::BadRequest(
                    "replies must target a thread of the same course".to_string(),
                ));
            }
            if parent.parent_id.is_some() {
                return Err(ApiError::BadRequest(
                    "replies must target a thread, not another reply".to_string(),
                ));
            }
        }
        None if title.is_none() => {
            return Err(ApiError::BadRequest("new threads need a title".to_string()));
        }
        None => {}
    }

    let post = discussions::insert(
        &state.db,
        &course_id,
        user.id(),
        req.parent_id.as_deref(),
        title,
        content,
    )
    .await?;

    info!(discussion_id = %post.id, course_id = %course_id, reply = post.parent_id.is_some(), "Discussion posted");
    state.event_bus.emit_lossy(StudyEvent::DiscussionPosted {
        course_id,
        discussion_id: post.id.clone(),
        timestamp: Utc::now(),
    });

    Ok((StatusCode::CREATED, Json(post)))
}

/// DELETE /api/discussions/:id
///
/// Authors may delete their own posts; admins may delete any. Deleting a
/// thread removes its replies.
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let post = discussions::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("discussion {}", id)))?;

    if post.user_id != user.id() && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "only the author or an admin can delete this post".to_string(),
        ));
    }

    discussions::delete(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn discussion_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/courses/:id/discussions",
            get(list_threads).post(create_post),
        )
        .route("/api/discussions/:id", get(get_thread).delete(delete_post))
}
