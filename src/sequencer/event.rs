// Event - Timed musical events and the lists that hold them
// An EventList is the unit of musical content owned by a Block.

use crate::sequencer::error::DataIntegrityError;
use crate::sequencer::time::{Tick, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest valid MIDI data byte (pitch, velocity, pressure)
pub const MIDI_DATA_MAX: u8 = 127;

/// 14-bit pitch bend range, centred on zero
pub const BEND_MIN: i16 = -8192;
pub const BEND_MAX: i16 = 8191;

/// What an event does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    /// Pitch bend, `BEND_MIN..=BEND_MAX`
    Bend { value: i16 },
    /// Continuous velocity (channel pressure)
    Pressure { value: u8 },
}

impl EventKind {
    /// Pitch for note events
    pub fn pitch(&self) -> Option<u8> {
        match self {
            EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch } => Some(*pitch),
            _ => None,
        }
    }
}

/// A musical event at an offset within its EventList
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub time: Tick,
    pub kind: EventKind,
}

impl Event {
    pub fn note_on(time: impl Into<Tick>, pitch: u8, velocity: u8) -> Self {
        Self {
            time: time.into(),
            kind: EventKind::NoteOn { pitch, velocity },
        }
    }

    pub fn note_off(time: impl Into<Tick>, pitch: u8) -> Self {
        Self {
            time: time.into(),
            kind: EventKind::NoteOff { pitch },
        }
    }

    pub fn bend(time: impl Into<Tick>, value: i16) -> Self {
        Self {
            time: time.into(),
            kind: EventKind::Bend { value },
        }
    }

    pub fn pressure(time: impl Into<Tick>, value: u8) -> Self {
        Self {
            time: time.into(),
            kind: EventKind::Pressure { value },
        }
    }

    /// Same event shifted later by `delta`
    pub fn shifted(&self, delta: Tick) -> Self {
        Self {
            time: self.time + delta,
            kind: self.kind,
        }
    }

    /// Bend mapped onto [-1.0, 1.0]
    pub fn normalized_bend(&self) -> Option<f32> {
        match self.kind {
            EventKind::Bend { value } if value < 0 => Some(value as f32 / -(BEND_MIN as f32)),
            EventKind::Bend { value } => Some(value as f32 / BEND_MAX as f32),
            _ => None,
        }
    }
}

/// Get the note name (e.g., "C4", "A#5")
pub fn note_name(pitch: u8) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];

    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Ordered, immutable sequence of events
///
/// Built through [`EventListBuilder`], which validates note pairing and value
/// ranges once. Events are sorted by timestamp; equal timestamps keep the
/// order in which they were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    events: Vec<Event>,
    /// Explicit length including trailing silence
    length: Option<Tick>,
}

impl EventList {
    pub fn builder() -> EventListBuilder {
        EventListBuilder::default()
    }

    /// Validate and finalize a list of events
    pub fn from_events(
        events: impl IntoIterator<Item = Event>,
    ) -> Result<Self, DataIntegrityError> {
        let mut builder = EventListBuilder::default();
        builder.extend(events);
        builder.finish()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Max event timestamp, or the explicit length when longer
    pub fn duration(&self) -> Tick {
        let last = self.events.last().map(|e| e.time).unwrap_or_default();
        self.length.map_or(last, |length| length.max(last))
    }

    pub fn explicit_length(&self) -> Option<Tick> {
        self.length
    }

    /// Events whose timestamp falls inside `range`
    pub fn events_in(&self, range: TimeRange) -> &[Event] {
        let lower = self.events.partition_point(|e| e.time < range.start);
        let upper = self.events.partition_point(|e| e.time < range.end);
        &self.events[lower..upper.max(lower)]
    }

    /// Distinct pitches used by note events, ascending
    pub fn pitches(&self) -> BTreeSet<u8> {
        self.events.iter().filter_map(|e| e.kind.pitch()).collect()
    }

    /// The content looped back to back until `length`, or cut short by it
    ///
    /// A note still held when one pass ends is released where the pass ends,
    /// and so is a note cut off by `length`. A final pass that ends exactly
    /// at `length` is left as written.
    pub fn repeated(&self, length: Tick) -> EventList {
        let period = self.duration();
        if period == Tick::ZERO {
            return EventList {
                events: self.events.clone(),
                length: Some(length),
            };
        }

        let mut events = Vec::new();
        let mut held = [false; MIDI_DATA_MAX as usize + 1];
        let mut pass_start = Tick::ZERO;
        loop {
            let pass_end = pass_start + period;
            let truncated = pass_end > length;
            for event in &self.events {
                let time = pass_start + event.time;
                if truncated && time >= length {
                    break;
                }
                if let Some(slot) = event.kind.pitch().and_then(|p| held.get_mut(p as usize)) {
                    *slot = matches!(event.kind, EventKind::NoteOn { .. });
                }
                events.push(event.shifted(pass_start));
            }

            let last = pass_end >= length;
            if truncated || !last {
                let release = pass_end.min(length);
                for (pitch, sounding) in held.iter_mut().enumerate() {
                    if std::mem::take(sounding) {
                        events.push(Event::note_off(release, pitch as u8));
                    }
                }
            }
            if last {
                break;
            }
            pass_start = pass_end;
        }

        EventList {
            events,
            length: Some(length),
        }
    }
}

/// Accumulates events in timestamp order, then validates into an EventList
#[derive(Debug, Clone, Default)]
pub struct EventListBuilder {
    events: Vec<Event>,
    length: Option<Tick>,
}

impl EventListBuilder {
    /// Insert after every event with the same or earlier timestamp
    pub fn push(&mut self, event: Event) -> &mut Self {
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
        self
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) -> &mut Self {
        for event in events {
            self.push(event);
        }
        self
    }

    /// Explicit length, for trailing silence after the last event
    pub fn with_length(&mut self, length: Tick) -> &mut Self {
        self.length = Some(length);
        self
    }

    /// Append events already known to be in order
    ///
    /// Used by the joiner, whose merge produces sorted output.
    pub(crate) fn push_sorted(&mut self, event: Event) {
        debug_assert!(self.events.last().is_none_or(|last| last.time <= event.time));
        self.events.push(event);
    }

    pub fn finish(&mut self) -> Result<EventList, DataIntegrityError> {
        validate(&self.events)?;
        Ok(EventList {
            events: std::mem::take(&mut self.events),
            length: self.length.take(),
        })
    }
}

/// Check value ranges and note pairing
fn validate(events: &[Event]) -> Result<(), DataIntegrityError> {
    let mut sounding = [false; MIDI_DATA_MAX as usize + 1];

    for event in events {
        let at = event.time;
        match event.kind {
            EventKind::NoteOn { pitch, velocity } => {
                if pitch > MIDI_DATA_MAX {
                    return Err(DataIntegrityError::PitchOutOfRange { pitch, at });
                }
                if velocity > MIDI_DATA_MAX {
                    return Err(DataIntegrityError::VelocityOutOfRange { velocity, at });
                }
                if sounding[pitch as usize] {
                    return Err(DataIntegrityError::DoubleNoteOn { pitch, at });
                }
                sounding[pitch as usize] = true;
            }
            EventKind::NoteOff { pitch } => {
                if pitch > MIDI_DATA_MAX {
                    return Err(DataIntegrityError::PitchOutOfRange { pitch, at });
                }
                if !sounding[pitch as usize] {
                    return Err(DataIntegrityError::UnmatchedNoteOff { pitch, at });
                }
                sounding[pitch as usize] = false;
            }
            EventKind::Bend { value } => {
                if !(BEND_MIN..=BEND_MAX).contains(&value) {
                    return Err(DataIntegrityError::BendOutOfRange { value, at });
                }
            }
            EventKind::Pressure { value } => {
                if value > MIDI_DATA_MAX {
                    return Err(DataIntegrityError::VelocityOutOfRange { velocity: value, at });
                }
            }
        }
    }

    Ok(())
}
