// Layout engine - Incremental block geometry
//
// Timeline mutations only mark block ids dirty. A recompute pass visits the
// dirty set (plus neighbours whose stacking row may have changed) and nothing
// else, and bursts of changes inside one frame interval share a single pass.

use crate::layout::view::{Rect, Stacking, ViewTransform};
use crate::sequencer::block::{Block, BlockId, LaneId};
use crate::sequencer::time::Tick;
use crate::sequencer::timeline::{Timeline, TimelineChange};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Layout query errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("no layout for unknown block {0}")]
    UnknownBlock(BlockId),
}

/// Cached geometry of one block, unscrolled
#[derive(Debug, Clone, Copy, PartialEq)]
struct LayoutEntry {
    rect: Rect,
    row: u8,
}

pub struct LayoutEngine {
    view: ViewTransform,
    frame_interval: Duration,
    cache: HashMap<BlockId, LayoutEntry>,
    dirty: HashSet<BlockId>,
    /// When the oldest unprocessed change arrived
    pending_since: Option<Instant>,
    recomputed: u64,
    passes: u64,
}

impl LayoutEngine {
    pub fn new(view: ViewTransform, frame_interval: Duration) -> Self {
        Self {
            view,
            frame_interval,
            cache: HashMap::new(),
            dirty: HashSet::new(),
            pending_since: None,
            recomputed: 0,
            passes: 0,
        }
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Change the view. Zoom or lane geometry changes invalidate every
    /// cached entry; scrolling alone invalidates nothing.
    pub fn set_view(&mut self, view: ViewTransform) {
        let relayout = self.view.geometry_differs(&view);
        self.view = view;
        if relayout {
            self.dirty.extend(self.cache.keys().copied());
            self.pending_since.get_or_insert_with(Instant::now);
            debug!(entries = self.dirty.len(), "view changed, layout invalidated");
        }
    }

    pub fn set_scroll(&mut self, scroll_x: f32) {
        self.view.scroll_x = scroll_x;
    }

    /// Record Timeline mutations. Only the touched blocks and, when stacking,
    /// their old and new lane successors become dirty.
    pub fn on_changes(&mut self, timeline: &Timeline, changes: &[TimelineChange], now: Instant) {
        if changes.is_empty() {
            return;
        }
        let stacking = self.view.stacking == Stacking::AvoidOverlap;

        for change in changes {
            match *change {
                TimelineChange::Inserted { id, .. } | TimelineChange::Resized { id, .. } => {
                    self.dirty.insert(id);
                    if stacking {
                        self.mark_successor(timeline.successor(id));
                    }
                }
                TimelineChange::Moved {
                    id,
                    from_lane,
                    from_start,
                    ..
                } => {
                    self.dirty.insert(id);
                    if stacking {
                        self.mark_successor(timeline.successor(id));
                        self.mark_successor(timeline.successor_at(from_lane, from_start, id));
                    }
                }
                TimelineChange::Removed { id, lane, start } => {
                    self.cache.remove(&id);
                    self.dirty.remove(&id);
                    if stacking {
                        self.mark_successor(timeline.successor_at(lane, start, id));
                    }
                }
            }
        }

        if !self.dirty.is_empty() {
            self.pending_since.get_or_insert(now);
        }
        trace!(dirty = self.dirty.len(), "layout changes recorded");
    }

    /// Run the pending pass once a full frame interval has passed since the
    /// first unprocessed change. Returns the number of blocks recomputed.
    pub fn poll(&mut self, timeline: &Timeline, now: Instant) -> usize {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.frame_interval => {
                self.run_pass(timeline)
            }
            _ => 0,
        }
    }

    /// Run the pending pass immediately
    pub fn flush(&mut self, timeline: &Timeline) -> usize {
        self.run_pass(timeline)
    }

    /// Scrolled bounds of a block, recomputing first if the entry is stale
    pub fn bounds(&mut self, timeline: &Timeline, id: BlockId) -> Result<Rect, LayoutError> {
        if timeline.block(id).is_none() {
            self.cache.remove(&id);
            self.dirty.remove(&id);
            return Err(LayoutError::UnknownBlock(id));
        }
        if self.dirty.contains(&id) || !self.cache.contains_key(&id) {
            self.dirty.insert(id);
            self.run_pass(timeline);
        }
        self.cache
            .get(&id)
            .map(|entry| entry.rect.translated(-self.view.scroll_x, 0.0))
            .ok_or(LayoutError::UnknownBlock(id))
    }

    /// Blocks intersecting the viewport `[left, left + width) x [top, top + height)`
    /// with their scrolled bounds
    pub fn visible(
        &mut self,
        timeline: &Timeline,
        viewport: Rect,
    ) -> Vec<(BlockId, Rect)> {
        let lanes = self.view.lanes_between(viewport.y, viewport.bottom());
        let mut range = self.view.visible_range(viewport.x, viewport.right());
        // Narrow blocks are drawn wider than their span
        range.start = range
            .start
            .saturating_sub(self.view.x_to_tick(self.view.min_block_width));

        let ids: Vec<BlockId> = timeline
            .lanes()
            .filter(|lane| lanes.contains(lane))
            .flat_map(|lane| timeline.blocks_overlapping(lane, range))
            .map(|b| b.id())
            .collect();

        if ids.iter().any(|id| self.dirty.contains(id) || !self.cache.contains_key(id)) {
            self.dirty
                .extend(ids.iter().filter(|id| !self.cache.contains_key(*id)));
            self.run_pass(timeline);
        }

        let scroll = self.view.scroll_x;
        ids.into_iter()
            .filter_map(|id| {
                let rect = self.cache.get(&id)?.rect.translated(-scroll, 0.0);
                rect.intersects(&viewport).then_some((id, rect))
            })
            .collect()
    }

    pub fn is_dirty(&self, id: BlockId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Total block recomputations since creation
    pub fn recompute_count(&self) -> u64 {
        self.recomputed
    }

    /// Total recompute passes since creation
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    /// Drop every cached entry
    pub fn clear(&mut self) {
        self.cache.clear();
        self.dirty.clear();
        self.pending_since = None;
    }

    fn mark_successor(&mut self, successor: Option<&Block>) {
        if let Some(block) = successor {
            self.dirty.insert(block.id());
        }
    }

    fn run_pass(&mut self, timeline: &Timeline) -> usize {
        self.pending_since = None;
        if self.dirty.is_empty() {
            return 0;
        }

        // Lane order, then start order, so predecessors settle first
        let mut queue: BTreeSet<(LaneId, Tick, BlockId)> = BTreeSet::new();
        for id in self.dirty.drain() {
            match timeline.block(id) {
                Some(block) => {
                    queue.insert((block.lane(), block.start(), id));
                }
                None => {
                    self.cache.remove(&id);
                }
            }
        }

        let before = self.recomputed;
        while let Some((_, _, id)) = queue.pop_first() {
            let Some(block) = timeline.block(id) else {
                continue;
            };
            let previous_row = self.cache.get(&id).map(|entry| entry.row);
            let below = self.predecessor_entry(timeline, block);
            let entry = self.compute(block, below);

            if self.view.stacking == Stacking::AvoidOverlap && previous_row != Some(entry.row) {
                if let Some(next) = timeline.successor(id) {
                    if self.cache.contains_key(&next.id()) {
                        queue.insert((next.lane(), next.start(), next.id()));
                    }
                }
            }
        }

        self.passes += 1;
        let count = (self.recomputed - before) as usize;
        debug!(recomputed = count, "layout pass");
        count
    }

    /// Cached entry of the lane predecessor, computing any uncached chain
    /// before it first
    fn predecessor_entry(&mut self, timeline: &Timeline, block: &Block) -> Option<LayoutEntry> {
        if self.view.stacking == Stacking::Flat {
            return None;
        }

        let mut chain = Vec::new();
        let mut cursor = timeline.predecessor(block.id());
        while let Some(pred) = cursor {
            if self.cache.contains_key(&pred.id()) {
                break;
            }
            chain.push(pred);
            cursor = timeline.predecessor(pred.id());
        }

        let mut below = cursor.and_then(|pred| self.cache.get(&pred.id()).copied());
        for pred in chain.into_iter().rev() {
            below = Some(self.compute(pred, below));
        }
        below
    }

    /// Geometry of `block` given its predecessor's entry; caches the result
    fn compute(&mut self, block: &Block, below: Option<LayoutEntry>) -> LayoutEntry {
        let view = &self.view;
        let x = view.tick_to_x(block.start());
        let width = view.tick_to_x(block.duration()).max(view.min_block_width);

        let row = match (view.stacking, below) {
            (Stacking::AvoidOverlap, Some(pred)) if pred.row == 0 && pred.rect.right() > x => 1,
            _ => 0,
        };
        let y = view.lane_top(block.lane()) + row as f32 * view.row_height();

        let entry = LayoutEntry {
            rect: Rect::new(x, y, width, view.row_height()),
            row,
        };
        self.cache.insert(block.id(), entry);
        self.recomputed += 1;
        entry
    }
}
