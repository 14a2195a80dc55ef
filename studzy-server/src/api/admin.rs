//! Admin dashboard endpoints

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use studzy_common::db::{Profile, Role};
use tracing::info;

use crate::auth::AdminUser;
use crate::db::profiles;
use crate::db::stats::{self, PortalStats};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counts: PortalStats,
    pub event_subscribers: usize,
    pub uptime_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        counts: stats::portal_stats(&state.db).await?,
        event_subscribers: state.event_bus.subscriber_count(),
        uptime_seconds: (Utc::now() - state.startup_time).num_seconds(),
    }))
}

/// PUT /api/admin/users/:id/role
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<Json<Profile>> {
    let role = Role::parse(req.role.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown role {}", req.role)))?;

    if user_id == admin.id() && role != Role::Admin {
        return Err(ApiError::BadRequest("admins cannot demote themselves".to_string()));
    }

    if !profiles::set_role(&state.db, &user_id, role).await? {
        return Err(ApiError::NotFound(format!("user {}", user_id)));
    }

    info!(user_id = %user_id, role = role.as_str(), admin = %admin.id(), "Changed user role");
    Ok(Json(profiles::get_profile(&state.db, &user_id).await?))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/users/:id/role", put(set_role))
}
