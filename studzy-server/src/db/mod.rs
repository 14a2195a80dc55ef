//! Database access layer for studzy-server
//!
//! One module per table group. Every function takes the pool explicitly and
//! returns `studzy_common::Result`.

pub mod activity;
pub mod attempts;
pub mod bookmarks;
pub mod chat;
pub mod courses;
pub mod discussions;
pub mod embeddings;
pub mod presence;
pub mod profiles;
pub mod progress;
pub mod questions;
pub mod quiz_sessions;
pub mod resources;
pub mod stats;
