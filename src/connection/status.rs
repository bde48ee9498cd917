// Status des collaborateurs externes (horloge audio, sampler)

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Error = 3,
}

impl CollaboratorStatus {
    /// Whether the UI should show a "not available" warning
    pub fn needs_warning(&self) -> bool {
        matches!(self, CollaboratorStatus::Disconnected | CollaboratorStatus::Error)
    }
}

impl From<u8> for CollaboratorStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => CollaboratorStatus::Connecting,
            2 => CollaboratorStatus::Connected,
            3 => CollaboratorStatus::Error,
            _ => CollaboratorStatus::Disconnected,
        }
    }
}

/// Atomic wrapper pour partager le status entre threads
#[derive(Debug, Clone)]
pub struct AtomicCollaboratorStatus {
    inner: Arc<AtomicU8>,
}

impl AtomicCollaboratorStatus {
    pub fn new(status: CollaboratorStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status as u8)),
        }
    }

    pub fn get(&self) -> CollaboratorStatus {
        CollaboratorStatus::from(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, status: CollaboratorStatus) {
        self.inner.store(status as u8, Ordering::Relaxed);
    }

    /// Store `status` and return the previous one
    pub fn update(&self, status: CollaboratorStatus) -> CollaboratorStatus {
        CollaboratorStatus::from(self.inner.swap(status as u8, Ordering::Relaxed))
    }
}

impl Default for AtomicCollaboratorStatus {
    fn default() -> Self {
        Self::new(CollaboratorStatus::Disconnected)
    }
}

/// Liens partagés entre la lecture et l'UI
#[derive(Debug, Clone, Default)]
pub struct CollaboratorLinks {
    pub clock: AtomicCollaboratorStatus,
    pub sampler: AtomicCollaboratorStatus,
}
