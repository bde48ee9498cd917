// Markers - Time marks used for navigation and default loop bounds

use crate::sequencer::time::{Tick, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted set of unique time marks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerList {
    marks: BTreeSet<Tick>,
}

impl MarkerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mark at `at`, or remove it if one is already there.
    /// Returns true when a mark was added.
    pub fn toggle(&mut self, at: Tick) -> bool {
        if self.marks.remove(&at) {
            false
        } else {
            self.marks.insert(at);
            true
        }
    }

    pub fn contains(&self, at: Tick) -> bool {
        self.marks.contains(&at)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tick> + '_ {
        self.marks.iter().copied()
    }

    /// Last mark strictly before `from`. The timeline start acts as a
    /// virtual mark, so this never fails.
    pub fn previous(&self, from: Tick) -> Tick {
        self.marks
            .range(..from)
            .next_back()
            .copied()
            .unwrap_or(Tick::ZERO)
    }

    /// First mark strictly after `from`
    pub fn next(&self, from: Tick) -> Option<Tick> {
        self.marks.range(Tick(from.0.saturating_add(1))..).next().copied()
    }

    /// Region between the marks surrounding `at`
    ///
    /// A mark exactly at `at` opens the region. `None` when no mark follows.
    pub fn bounds_around(&self, at: Tick) -> Option<TimeRange> {
        let start = self.previous(Tick(at.0.saturating_add(1)));
        self.next(at).map(|end| TimeRange::new(start, end))
    }
}
