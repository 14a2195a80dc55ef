//! studzy-server library
//!
//! HTTP backend of the Studzy study portal: courses and their resources,
//! CBT quizzes, course-grounded AI chat, bookmarks, discussions and study
//! activity tracking.

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use studzy_common::config::StudzyConfig;
use studzy_common::events::EventBus;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;
pub mod storage;

pub use error::{ApiError, ApiResult};
use services::llm::LlmProvider;
use storage::ObjectStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    /// Chat completion and embedding backend
    pub llm: Arc<dyn LlmProvider>,
    /// Resource file storage
    pub storage: ObjectStore,
    pub config: Arc<StudzyConfig>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        llm: Arc<dyn LlmProvider>,
        storage: ObjectStore,
        config: StudzyConfig,
    ) -> Self {
        let event_bus = EventBus::new(config.server.event_capacity);
        Self {
            db,
            event_bus,
            llm,
            storage,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` authenticates through the
/// `AuthUser`/`AdminUser` extractors except register and login.
pub fn build_router(state: AppState) -> Router {
    // Multipart framing adds a little on top of the file itself
    let upload_limit = state.config.server.max_upload_bytes.saturating_add(64 * 1024);

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::course_routes())
        .merge(api::resource_routes())
        .merge(api::cbt_routes())
        .merge(api::chat_routes())
        .merge(api::bookmark_routes())
        .merge(api::discussion_routes())
        .merge(api::activity_routes())
        .merge(api::progress_routes())
        .merge(api::presence_routes())
        .merge(api::admin_routes())
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
