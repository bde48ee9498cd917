// Shared fixtures for the integration tests

#![allow(dead_code)]

use blockseq::transport::{ClockControl, CollaboratorUnavailable, SamplerSink, TransportError};
use blockseq::{Event, EventList, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    On(u8, Tick),
    Off(u8, Tick),
    Bend(i16, Tick),
    Pressure(u8, Tick),
}

/// Sampler recording every call; `missing` makes it refuse everything
#[derive(Default)]
pub struct RecordingSampler {
    pub sent: Vec<Sent>,
    pub missing: bool,
}

impl RecordingSampler {
    fn record(&mut self, sent: Sent) -> Result<(), CollaboratorUnavailable> {
        if self.missing {
            return Err(CollaboratorUnavailable::SamplerMissing);
        }
        self.sent.push(sent);
        Ok(())
    }

    pub fn note_ons(&self) -> Vec<(u8, Tick)> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::On(pitch, at) => Some((*pitch, *at)),
                _ => None,
            })
            .collect()
    }
}

impl SamplerSink for RecordingSampler {
    fn note_on(&mut self, pitch: u8, _velocity: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        self.record(Sent::On(pitch, at))
    }

    fn note_off(&mut self, pitch: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        self.record(Sent::Off(pitch, at))
    }

    fn bend(&mut self, value: i16, at: Tick) -> Result<(), CollaboratorUnavailable> {
        self.record(Sent::Bend(value, at))
    }

    fn pressure(&mut self, value: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        self.record(Sent::Pressure(value, at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start,
    Stop,
    Locate(Tick),
}

#[derive(Default)]
pub struct RecordingClock {
    pub calls: Vec<Call>,
    pub disconnected: bool,
}

impl RecordingClock {
    fn record(&mut self, call: Call) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::ClockDisconnected);
        }
        self.calls.push(call);
        Ok(())
    }
}

impl ClockControl for RecordingClock {
    fn start(&mut self) -> Result<(), TransportError> {
        self.record(Call::Start)
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.record(Call::Stop)
    }

    fn locate(&mut self, position: Tick) -> Result<(), TransportError> {
        self.record(Call::Locate(position))
    }
}

/// One note lasting the whole block
pub fn held_note(pitch: u8, length: u64) -> EventList {
    let mut builder = EventList::builder();
    builder
        .push(Event::note_on(0u64, pitch, 100))
        .push(Event::note_off(length, pitch))
        .with_length(Tick(length));
    builder.finish().unwrap()
}

/// Empty block of the given length
pub fn silence(length: u64) -> EventList {
    let mut builder = EventList::builder();
    builder.with_length(Tick(length));
    builder.finish().unwrap()
}
