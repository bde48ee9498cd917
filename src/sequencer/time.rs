// Time - Fixed-point timeline units
// Every offset in the data model is a whole number of ticks, so moving or
// joining blocks never accumulates floating point drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Position or length on the timeline, in ticks
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Ticks per quarter note (PPQN), standard MIDI resolution
    pub const PER_QUARTER: u64 = 480;

    pub const ZERO: Tick = Tick(0);

    /// Tick count of `quarters` quarter notes, saturating
    pub const fn quarters(quarters: u64) -> Self {
        Tick(quarters.saturating_mul(Self::PER_QUARTER))
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn saturating_sub(self, other: Tick) -> Tick {
        Tick(self.0.saturating_sub(other.0))
    }

    pub fn checked_add(self, other: Tick) -> Option<Tick> {
        self.0.checked_add(other.0).map(Tick)
    }

    /// Signed distance from `self` to `other`
    pub fn delta_to(self, other: Tick) -> i64 {
        other.0 as i64 - self.0 as i64
    }

    /// Offset by a signed delta, clamped at zero
    pub fn offset(self, delta: i64) -> Tick {
        if delta >= 0 {
            Tick(self.0.saturating_add(delta as u64))
        } else {
            Tick(self.0.saturating_sub(delta.unsigned_abs()))
        }
    }
}

impl Add for Tick {
    type Output = Tick;

    fn add(self, rhs: Tick) -> Tick {
        Tick(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Tick {
    type Output = Tick;

    /// Saturates at zero; timeline positions are never negative
    fn sub(self, rhs: Tick) -> Tick {
        self.saturating_sub(rhs)
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t", self.0)
    }
}

/// Closed-open tick interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Tick,
    pub end: Tick,
}

impl TimeRange {
    /// Creates a range; `end` is clamped so it never precedes `start`
    pub fn new(start: Tick, end: Tick) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn with_length(start: Tick, length: Tick) -> Self {
        Self::new(start, start + length)
    }

    pub fn length(&self) -> Tick {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.start && tick < self.end
    }

    /// Closed-open intersection test. Empty ranges overlap nothing.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end
            && other.start < self.end
    }

    /// Smallest range covering both
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.0, self.end.0)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo, `None` when outside [20.0, 999.0]
    pub fn new(bpm: f64) -> Option<Self> {
        (Self::MIN_BPM..=Self::MAX_BPM)
            .contains(&bpm)
            .then_some(Self { bpm })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Map an audio-server frame position onto the tick grid
    pub fn ticks_from_frames(&self, frames: u64, sample_rate: f64) -> Tick {
        let seconds = frames as f64 / sample_rate;
        let beats = seconds / self.beat_duration_seconds();
        Tick((beats * Tick::PER_QUARTER as f64).round() as u64)
    }

    /// Frame position of a tick at the given sample rate
    pub fn frames_from_ticks(&self, tick: Tick, sample_rate: f64) -> u64 {
        let beats = tick.0 as f64 / Tick::PER_QUARTER as f64;
        (beats * self.beat_duration_seconds() * sample_rate).round() as u64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_arithmetic_saturates() {
        assert_eq!(Tick(5) - Tick(10), Tick::ZERO);
        assert_eq!(Tick(u64::MAX) + Tick(1), Tick(u64::MAX));
        assert_eq!(Tick(10).offset(-4), Tick(6));
        assert_eq!(Tick(3).offset(-4), Tick::ZERO);
        assert_eq!(Tick(3).delta_to(Tick(1)), -2);
        assert_eq!(Tick::quarters(u64::MAX), Tick(u64::MAX));
    }

    #[test]
    fn test_range_overlap_is_closed_open() {
        let a = TimeRange::new(Tick(0), Tick(4));
        let b = TimeRange::new(Tick(4), Tick(6));
        let c = TimeRange::new(Tick(3), Tick(5));

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(a.contains(Tick(0)));
        assert!(!a.contains(Tick(4)));
    }

    #[test]
    fn test_empty_range_overlaps_nothing() {
        let point = TimeRange::new(Tick(2), Tick(2));
        let wide = TimeRange::new(Tick(0), Tick(10));

        assert!(point.is_empty());
        assert!(!point.overlaps(&wide));
        assert!(!wide.overlaps(&point));
    }

    #[test]
    fn test_range_union() {
        let a = TimeRange::new(Tick(2), Tick(4));
        let b = TimeRange::new(Tick(6), Tick(9));
        assert_eq!(a.union(&b), TimeRange::new(Tick(2), Tick(9)));
    }

    #[test]
    fn test_tempo_bounds() {
        assert!(Tempo::new(19.9).is_none());
        assert!(Tempo::new(1000.0).is_none());
        assert_eq!(Tempo::new(140.0).map(|t| t.bpm()), Some(140.0));
    }

    #[test]
    fn test_frame_conversion() {
        let tempo = Tempo::default();

        // At 120 BPM one beat = 0.5s = 24000 frames at 48kHz
        assert_eq!(tempo.ticks_from_frames(24000, 48000.0), Tick::quarters(1));
        assert_eq!(tempo.frames_from_ticks(Tick::quarters(2), 48000.0), 48000);
    }
}
