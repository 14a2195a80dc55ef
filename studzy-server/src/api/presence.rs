//! Live study presence
//!
//! Clients send heartbeats while a user studies. A user counts as online
//! while their last heartbeat is younger than `presence.stale_after_secs`;
//! the offline-to-online transition is broadcast as `PresenceChanged`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use studzy_common::db::StudyPresence;
use studzy_common::events::StudyEvent;
use studzy_common::time::is_stale;
use tracing::debug;

use crate::api::sse::event_stream;
use crate::auth::AuthUser;
use crate::db::presence::{self, ActiveStudent};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatRequest {
    pub course_id: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    pub course_id: Option<String>,
}

/// POST /api/presence/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<HeartbeatRequest>>,
) -> ApiResult<Json<StudyPresence>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let now = Utc::now();
    let stale_after = state.config.presence.stale_after_secs;

    let was_online = presence::get(&state.db, user.id())
        .await?
        .map(|p| !is_stale(p.last_seen, now, stale_after))
        .unwrap_or(false);

    presence::upsert(
        &state.db,
        user.id(),
        req.course_id.as_deref(),
        req.resource_id.as_deref(),
        now,
        !was_online,
    )
    .await?;

    if !was_online {
        debug!(user_id = %user.id(), "User came online");
        state.event_bus.emit_lossy(StudyEvent::PresenceChanged {
            course_id: req.course_id.clone(),
            user_id: user.id().to_string(),
            online: true,
            timestamp: now,
        });
    }

    presence::get(&state.db, user.id())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Internal("presence row missing after heartbeat".to_string()))
}

/// POST /api/presence/leave
pub async fn leave(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    if let Some(removed) = presence::remove(&state.db, user.id()).await? {
        state.event_bus.emit_lossy(StudyEvent::PresenceChanged {
            course_id: removed.course_id,
            user_id: removed.user_id,
            online: false,
            timestamp: Utc::now(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/presence
pub async fn list_online(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PresenceQuery>,
) -> ApiResult<Json<Vec<ActiveStudent>>> {
    let since = Utc::now() - Duration::seconds(state.config.presence.stale_after_secs);
    let students = presence::list_active(&state.db, query.course_id.as_deref(), since).await?;
    Ok(Json(students))
}

pub fn presence_routes() -> Router<AppState> {
    Router::new()
        .route("/api/presence", get(list_online))
        .route("/api/presence/heartbeat", post(heartbeat))
        .route("/api/presence/leave", post(leave))
        .route("/api/events", get(event_stream))
}
