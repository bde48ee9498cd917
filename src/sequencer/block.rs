// Block - A timeline-placed container owning one EventList

use crate::sequencer::event::EventList;
use crate::sequencer::time::{Tick, TimeRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable block identity, unique within a Timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Track index on the Timeline
pub type LaneId = u32;

/// A block of events placed on a lane
///
/// The EventList is shared behind an `Arc` so snapshots handed to the
/// playback thread and undo history can hold on to it without copying.
/// A block may run longer than its content, which then repeats, or shorter,
/// which cuts the content off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    lane: LaneId,
    start: Tick,
    events: Arc<EventList>,
    /// Set when the block length differs from the content duration
    length: Option<Tick>,
    /// What plays: `events` looped or cut to `length`
    rendered: Arc<EventList>,
}

impl Block {
    pub fn new(id: BlockId, lane: LaneId, start: Tick, events: EventList) -> Self {
        let events = Arc::new(events);
        Self {
            id,
            lane,
            start,
            rendered: Arc::clone(&events),
            events,
            length: None,
        }
    }

    /// Same block running for `length`; `None` goes back to the content length
    pub fn with_length(self, length: Option<Tick>) -> Self {
        let length = length.filter(|l| *l != self.events.duration());
        let rendered = match length {
            Some(length) => Arc::new(self.events.repeated(length)),
            None => Arc::clone(&self.events),
        };
        Self {
            length,
            rendered,
            ..self
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn start(&self) -> Tick {
        self.start
    }

    pub fn duration(&self) -> Tick {
        self.rendered.duration()
    }

    pub fn end(&self) -> Tick {
        self.start + self.duration()
    }

    /// Occupied span `[start, start + duration)`
    pub fn span(&self) -> TimeRange {
        TimeRange::with_length(self.start, self.duration())
    }

    /// The content as written, one pass
    pub fn events(&self) -> &EventList {
        &self.events
    }

    /// The content as played over the whole block
    pub fn rendered(&self) -> &EventList {
        &self.rendered
    }

    /// Explicit block length, if any
    pub fn length(&self) -> Option<Tick> {
        self.length
    }

    /// Offset at which the content starts over
    pub fn repeat_time(&self) -> Tick {
        self.events.duration()
    }

    /// Number of passes through the content, the last one possibly partial
    pub fn repetitions(&self) -> u64 {
        let period = self.repeat_time().0;
        if period == 0 {
            return 1;
        }
        self.duration().0.div_ceil(period).max(1)
    }

    /// Whether two blocks conflict on the same lane.
    /// Zero-duration blocks never conflict with anything.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.span().overlaps(&other.span())
    }

    /// Whether the block has content inside `range`.
    /// A zero-duration block is a point at `start`.
    pub fn intersects(&self, range: &TimeRange) -> bool {
        if self.duration() == Tick::ZERO {
            range.contains(self.start)
        } else {
            self.span().overlaps(range)
        }
    }

    pub(crate) fn placed_at(&self, lane: LaneId, start: Tick) -> Self {
        Self {
            lane,
            start,
            ..self.clone()
        }
    }
}
