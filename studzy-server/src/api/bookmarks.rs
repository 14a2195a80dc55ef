//! Bookmark endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::bookmarks::{self, BookmarkedResource};
use crate::db::resources;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub resource_id: String,
}

#[derive(Debug, Serialize)]
pub struct BookmarkStatus {
    pub resource_id: String,
    pub bookmarked: bool,
}

/// POST /api/bookmarks/toggle
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ToggleRequest>,
) -> ApiResult<Json<BookmarkStatus>> {
    if resources::get_resource(&state.db, &req.resource_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("resource {}", req.resource_id)));
    }
    let bookmarked = bookmarks::toggle(&state.db, user.id(), &req.resource_id).await?;
    Ok(Json(BookmarkStatus {
        resource_id: req.resource_id,
        bookmarked,
    }))
}

/// GET /api/bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<BookmarkedResource>>> {
    Ok(Json(bookmarks::list_for_user(&state.db, user.id()).await?))
}

/// GET /api/bookmarks/:resource_id
pub async fn bookmark_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> ApiResult<Json<BookmarkStatus>> {
    let bookmarked = bookmarks::is_bookmarked(&state.db, user.id(), &resource_id).await?;
    Ok(Json(BookmarkStatus {
        resource_id,
        bookmarked,
    }))
}

pub fn bookmark_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookmarks", get(list_bookmarks))
        .route("/api/bookmarks/toggle", post(toggle_bookmark))
        .route("/api/bookmarks/:resource_id", get(bookmark_status))
}
