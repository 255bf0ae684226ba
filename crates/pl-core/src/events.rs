//! Application event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that consumers attaching late (a status
//! listing, a dashboard) can catch up on what happened.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::media::ProcessingResult;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Monitor lifecycle ---------------------------------------------------
    MonitorStarted {
        directories: Vec<String>,
    },
    MonitorStopped,
    WatcherRestarted,

    // -- Pipeline ------------------------------------------------------------
    FileSettled {
        path: PathBuf,
    },
    FileProcessed {
        result: ProcessingResult,
    },

    // -- Redo log ------------------------------------------------------------
    RedoRecorded {
        id: i64,
    },
    RedoReplayed {
        id: i64,
        success: bool,
    },

    // -- Freeform system messages --------------------------------------------
    System {
        level: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        // Store in ring buffer regardless of subscriber count.
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.broadcast(EventPayload::MonitorStopped);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event.payload, EventPayload::MonitorStopped));
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for i in 0..150 {
            bus.broadcast(EventPayload::RedoRecorded { id: i });
        }
        let recent = bus.recent_events(200);
        assert_eq!(recent.len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        for _ in 0..5 {
            bus.broadcast(EventPayload::FileSettled {
                path: PathBuf::from("/downloads/a.mkv"),
            });
        }
        bus.broadcast(EventPayload::MonitorStopped);

        let recent = bus.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert!(matches!(recent[0].payload, EventPayload::MonitorStopped));
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::System {
            level: "error".into(),
            message: "test".into(),
        });
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event::new(EventPayload::FileProcessed {
            result: ProcessingResult::failure(
                Path::new("/downloads/a.mkv"),
                Path::new("/library"),
                "boom",
            ),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
    }

    #[test]
    fn default_event_bus() {
        let bus = EventBus::default();
        assert!(bus.recent_events(10).is_empty());
    }
}
