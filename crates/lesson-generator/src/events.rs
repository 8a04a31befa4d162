//! Lesson events and broadcasting for streaming observers.
//!
//! Every generation run produces a sequence of `progress` events followed by
//! exactly one `complete` or `error` event. Each event serializes with a
//! `type` tag, which the HTTP layer also uses as the SSE event name.
//!
//! # Example
//!
//! ```no_run
//! use lesson_generator::events::{EventBroadcaster, LessonEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(LessonEvent::error("source text is empty", None));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::lesson::GeneratedLesson;
use crate::progress::ProgressUpdate;

// ============================================================================
// Event Enum
// ============================================================================

/// Events emitted while a lesson is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LessonEvent {
    /// A progress report from the pipeline.
    Progress(ProgressUpdate),
    /// The lesson finished.
    Complete {
        /// The finished lesson.
        lesson: Box<GeneratedLesson>,
        /// When generation finished.
        timestamp: DateTime<Utc>,
    },
    /// Generation failed and will not continue.
    Error {
        /// Human-readable error message.
        message: String,
        /// Last progress report seen before the failure.
        progress: Option<ProgressUpdate>,
        /// When the failure happened.
        timestamp: DateTime<Utc>,
    },
}

impl LessonEvent {
    /// Creates a `Progress` event.
    #[must_use]
    pub const fn progress(update: ProgressUpdate) -> Self {
        Self::Progress(update)
    }

    /// Creates a `Complete` event stamped with the current time.
    #[must_use]
    pub fn complete(lesson: GeneratedLesson) -> Self {
        Self::Complete {
            lesson: Box::new(lesson),
            timestamp: Utc::now(),
        }
    }

    /// Creates an `Error` event carrying the last known progress snapshot.
    #[must_use]
    pub fn error(message: impl Into<String>, progress: Option<ProgressUpdate>) -> Self {
        Self::Error {
            message: message.into(),
            progress,
            timestamp: Utc::now(),
        }
    }

    /// Returns the event name, matching the serialized `type` tag.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether no further events follow this one in the same run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans lesson events out to every subscriber.
///
/// Events are not persisted for subscribers that join late.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<LessonEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LessonEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning how many subscribers will receive it.
    pub fn send(&self, event: LessonEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::SharedContext;
    use crate::level::CefrLevel;

    fn update(progress: u8) -> ProgressUpdate {
        ProgressUpdate {
            step: "Generating reading".to_string(),
            progress,
            phase: "reading".to_string(),
            section: None,
        }
    }

    fn lesson() -> GeneratedLesson {
        GeneratedLesson {
            lesson_type: "discussion".to_string(),
            level: CefrLevel::B1,
            target_language: "English".to_string(),
            context: SharedContext::new("Text.", "discussion", CefrLevel::B1, "English"),
            sections: Vec::new(),
            total_tokens: 0,
        }
    }

    #[test]
    fn test_progress_event_serializes_flat() {
        let json = serde_json::to_value(LessonEvent::progress(update(45))).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["progress"], 45);
        assert_eq!(json["phase"], "reading");
        assert!(json.get("section").is_none());
    }

    #[test]
    fn test_error_event_carries_snapshot() {
        let event = LessonEvent::error("completion service down", Some(update(25)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "completion service down");
        assert_eq!(json["progress"]["progress"], 25);
        assert!(json["timestamp"].is_string());

        let none = serde_json::to_value(LessonEvent::error("boom", None)).unwrap();
        assert!(none["progress"].is_null());
    }

    #[test]
    fn test_complete_event_round_trip() {
        let event = LessonEvent::complete(lesson());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"complete""#));
        assert!(json.contains(r#""lessonType":"discussion""#));

        let parsed: LessonEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_name(), "complete");
        assert!(parsed.is_terminal());
    }

    #[test]
    fn test_event_names_match_tags() {
        for event in [
            LessonEvent::progress(update(10)),
            LessonEvent::complete(lesson()),
            LessonEvent::error("x", None),
        ] {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_name());
        }
    }

    #[test]
    fn test_broadcaster_send_without_subscribers() {
        let broadcaster = EventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        assert_eq!(broadcaster.send(LessonEvent::progress(update(5))), 0);
    }

    #[test]
    fn test_broadcaster_delivers_to_all_subscribers() {
        let broadcaster = EventBroadcaster::new(16);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.send(LessonEvent::progress(update(60))), 2);

        let a = tokio_test::block_on(first.recv()).unwrap();
        let b = tokio_test::block_on(second.recv()).unwrap();
        assert_eq!(a.event_name(), "progress");
        assert!(!b.is_terminal());
    }
}
