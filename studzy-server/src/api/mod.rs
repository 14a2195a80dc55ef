//! HTTP API handlers for studzy-server

pub mod activity;
pub mod admin;
pub mod auth;
pub mod bookmarks;
pub mod cbt;
pub mod chat;
pub mod courses;
pub mod discussions;
pub mod health;
pub mod presence;
pub mod progress;
pub mod resources;
pub mod sse;

pub use activity::activity_routes;
pub use admin::admin_routes;
pub use auth::auth_routes;
pub use bookmarks::bookmark_routes;
pub use cbt::cbt_routes;
pub use chat::chat_routes;
pub use courses::course_routes;
pub use discussions::discussion_routes;
pub use health::health_routes;
pub use presence::presence_routes;
pub use progress::progress_routes;
pub use resources::resource_routes;
pub use sse::event_stream;
