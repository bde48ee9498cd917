// Contracts - Interfaces of the external audio clock and sampler
//
// Both collaborators live in other processes. These traits are the whole
// surface TransportSync relies on.

use crate::sequencer::time::{Tempo, Tick};
use crate::transport::error::{CollaboratorUnavailable, TransportError};

/// Sampler dispatch contract. Calls arrive in timestamp order.
pub trait SamplerSink: Send {
    fn note_on(&mut self, pitch: u8, velocity: u8, at: Tick) -> Result<(), CollaboratorUnavailable>;

    fn note_off(&mut self, pitch: u8, at: Tick) -> Result<(), CollaboratorUnavailable>;

    fn bend(&mut self, value: i16, at: Tick) -> Result<(), CollaboratorUnavailable>;

    /// Continuous velocity. Samplers without support may ignore it.
    fn pressure(&mut self, value: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        let _ = (value, at);
        Ok(())
    }
}

/// Transport commands sent to the audio server, which owns the clock
pub trait ClockControl: Send {
    fn start(&mut self) -> Result<(), TransportError>;

    fn stop(&mut self) -> Result<(), TransportError>;

    /// Move the clock. Acknowledged later with [`TransportAck::Located`].
    fn locate(&mut self, position: Tick) -> Result<(), TransportError>;
}

/// Acknowledgement of a command accepted by the audio server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAck {
    Started,
    Stopped,
    Located(Tick),
}

/// Everything the audio server sends back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Authoritative playhead position
    Tick(Tick),
    Ack(TransportAck),
    /// Connection to the audio server lost
    Disconnected,
}

impl ClockEvent {
    /// Tick event from a frame-counting clock
    pub fn from_frames(frames: u64, tempo: &Tempo, sample_rate: f64) -> Self {
        ClockEvent::Tick(tempo.ticks_from_frames(frames, sample_rate))
    }
}
