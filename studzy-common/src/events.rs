//! Event types and the broadcast event bus
//!
//! Events are emitted by request handlers and background tasks (resource
//! ingestion, presence tracking) and fanned out to every connected SSE client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Portal-wide event
///
/// Serialized with an internal `type` tag so SSE clients can dispatch on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StudyEvent {
    /// A user came online or went offline for a course
    PresenceChanged {
        course_id: Option<String>,
        user_id: String,
        online: bool,
        timestamp: DateTime<Utc>,
    },

    /// A resource finished RAG ingestion
    ResourceIngested {
        resource_id: String,
        chunk_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A resource failed RAG ingestion
    IngestFailed {
        resource_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A thread or reply was posted to a course discussion
    DiscussionPosted {
        course_id: String,
        discussion_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl StudyEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            StudyEvent::PresenceChanged { .. } => "PresenceChanged",
            StudyEvent::ResourceIngested { .. } => "ResourceIngested",
            StudyEvent::IngestFailed { .. } => "IngestFailed",
            StudyEvent::DiscussionPosted { .. } => "DiscussionPosted",
        }
    }
}

/// Broadcast channel for [`StudyEvent`]s
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StudyEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind lose the
    /// oldest events.
    ///
    /// ```
    /// use studzy_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StudyEvent,
    ) -> Result<usize, broadcast::error::SendError<StudyEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StudyEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingested(id: &str) -> StudyEvent {
        StudyEvent::ResourceIngested {
            resource_id: id.to_string(),
            chunk_count: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(ingested("r1")).is_err());
        // Lossy emission never fails
        bus.emit_lossy(ingested("r1"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(ingested("a")).unwrap();
        bus.emit(ingested("b")).unwrap();

        match rx.recv().await.unwrap() {
            StudyEvent::ResourceIngested { resource_id, .. } => assert_eq!(resource_id, "a"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StudyEvent::ResourceIngested { resource_id, .. } => assert_eq!(resource_id, "b"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = StudyEvent::PresenceChanged {
            course_id: Some("c1".to_string()),
            user_id: "u1".to_string(),
            online: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PresenceChanged");
        assert_eq!(json["online"], true);
        assert_eq!(event.event_type(), "PresenceChanged");
    }
}
