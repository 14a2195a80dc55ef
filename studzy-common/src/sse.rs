//! Server-Sent Events (SSE) utilities

use axum::response::sse::KeepAlive;
use std::time::Duration;

/// Keep-alive interval shared by every SSE endpoint
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Standard keep-alive for Studzy SSE responses
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(KEEP_ALIVE_INTERVAL)
        .text("heartbeat")
}
