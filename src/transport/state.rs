// Transport state - Play/pause/stop status and playhead
// TransportState is owned by the playback actor; SharedTransportState mirrors
// it through atomics for the UI thread.

use crate::sequencer::time::{Tick, TimeRange};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Transport status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportStatus::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportStatus::Stopped | TransportStatus::Paused)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportStatus::Playing,
            2 => TransportStatus::Paused,
            _ => TransportStatus::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TransportStatus::Stopped => 0,
            TransportStatus::Playing => 1,
            TransportStatus::Paused => 2,
        }
    }
}

/// Per-session transport state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportState {
    pub status: TransportStatus,
    /// Playhead, same time base as block offsets
    pub position: Tick,
    pub loop_region: Option<TimeRange>,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }

    /// Back to session start. The loop region is kept.
    pub fn reset(&mut self) {
        self.status = TransportStatus::Stopped;
        self.position = Tick::ZERO;
    }
}

/// Shared transport state
/// Thread-safe via atomics for display on the UI thread
#[derive(Debug, Default)]
pub struct SharedTransportState {
    status: AtomicU8,
    position: AtomicU64,
    loop_enabled: AtomicBool,
    loop_start: AtomicU64,
    loop_end: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status(&self) -> TransportStatus {
        TransportStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn position(&self) -> Tick {
        Tick(self.position.load(Ordering::Relaxed))
    }

    pub fn loop_region(&self) -> Option<TimeRange> {
        if !self.loop_enabled.load(Ordering::Relaxed) {
            return None;
        }
        Some(TimeRange::new(
            Tick(self.loop_start.load(Ordering::Relaxed)),
            Tick(self.loop_end.load(Ordering::Relaxed)),
        ))
    }

    /// Mirror a full state. Called by the playback actor after each transition.
    pub fn publish(&self, state: &TransportState) {
        self.status.store(state.status.as_u8(), Ordering::Relaxed);
        self.position.store(state.position.0, Ordering::Relaxed);
        match state.loop_region {
            Some(region) => {
                self.loop_start.store(region.start.0, Ordering::Relaxed);
                self.loop_end.store(region.end.0, Ordering::Relaxed);
                self.loop_enabled.store(true, Ordering::Relaxed);
            }
            None => self.loop_enabled.store(false, Ordering::Relaxed),
        }
    }

    /// Position-only update for the per-tick path
    pub fn set_position(&self, position: Tick) {
        self.position.store(position.0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportState {
        TransportState {
            status: self.status(),
            position: self.position(),
            loop_region: self.loop_region(),
        }
    }
}
