//! # Studzy Common Library
//!
//! Shared code for the Studzy study portal:
//! - Database schema initialization and row models
//! - Event types (StudyEvent enum) and the broadcast EventBus
//! - Configuration loading and root folder resolution
//! - SSE helpers
//! - Time and day-boundary utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
