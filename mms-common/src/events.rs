//! Domain events for the mentorship core
//!
//! Components emit events after their write is committed. Delivery is
//! best-effort: having no subscriber is not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events broadcast by the core services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MmsEvent {
    /// A meeting was written to the session tree and the mentor's log
    MeetingScheduled {
        mentor_id: String,
        meeting_id: String,
        academic_year: String,
        academic_session: String,
        semester: u8,
        mentee_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Attendance was recorded against a meeting
    AttendanceRecorded {
        mentor_id: String,
        meeting_id: String,
        present: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A meeting log was re-projected from the roster
    LogSynced {
        mentor_id: String,
        academic_year: String,
        academic_session: String,
        updated: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A mentor-mentee relationship was created or refreshed
    RelationshipAssigned {
        mentor_id: String,
        mentee_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An archival run finished (possibly interrupted)
    ArchivalCompleted {
        moved: usize,
        not_moved: usize,
        interrupted: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast channel for [`MmsEvent`]
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MmsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MmsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MmsEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
