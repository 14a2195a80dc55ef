//! Registration, login and session endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use studzy_common::db::{Profile, Role};
use tracing::info;

use crate::auth::{self, AuthUser, MIN_PASSWORD_LEN};
use crate::db::profiles;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub profile: Profile,
}

fn normalize_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::BadRequest("a valid email address is required".to_string())),
    }
}

async fn issue_token(state: &AppState, profile: Profile) -> ApiResult<SessionResponse> {
    let token = auth::generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config.auth.token_ttl_hours);
    profiles::insert_token(&state.db, &auth::token_digest(&token), &profile.id, expires_at).await?;

    Ok(SessionResponse {
        token,
        expires_at,
        profile,
    })
}

/// POST /api/auth/register
///
/// The first profile ever registered becomes an admin.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let email = normalize_email(&req.email)?;
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("full_name is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let role = if profiles::count_profiles(&state.db).await? == 0 {
        Role::Admin
    } else {
        Role::Student
    };

    let password_hash = auth::hash_password(&req.password)?;
    let profile = profiles::create_profile(&state.db, &email, full_name, &password_hash, role)
        .await
        .map_err(|e| match e {
            studzy_common::Error::Database(ref db_err) if is_unique_violation(db_err) => {
                ApiError::Conflict("email is already registered".to_string())
            }
            other => other.into(),
        })?;

    info!(user_id = %profile.id, role = role.as_str(), "Registered profile");
    let session = issue_token(&state, profile).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

    let email = req.email.trim().to_lowercase();
    let profile = profiles::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&req.password, &profile.password_hash) {
        return Err(invalid());
    }

    Ok(Json(issue_token(&state, profile).await?))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    profiles::delete_token(&state.db, &user.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(user: AuthUser) -> Json<Profile> {
    Json(user.profile)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
