// Notifications posted by the playback actor when it stops on its own

use crate::sequencer::time::Tick;
use std::fmt::{self, Display};
use std::time::{SystemTime, UNIX_EPOCH};

/// Collaborator whose failure stopped playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Audio server clock
    Clock,
    /// External sampler
    Sampler,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub category: NotificationCategory,
    pub message: String,
    /// Playhead when playback stopped
    pub position: Tick,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl Notification {
    pub fn playback_stopped(
        category: NotificationCategory,
        position: Tick,
        reason: &impl Display,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            category,
            message: format!("Playback stopped: {}", reason),
            position,
            timestamp,
        }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?} at {}] {}", self.category, self.position, self.message)
    }
}
