// Transport errors

/// Failure of the external clock or of the command handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("audio clock disconnected")]
    ClockDisconnected,

    #[error("transport command queue is full")]
    CommandQueueFull,
}

/// An external collaborator that cannot take events
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorUnavailable {
    #[error("sampler not available")]
    SamplerMissing,
}
