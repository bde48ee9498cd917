// Timeline - Authoritative arrangement of blocks on lanes
//
// All placement goes through this type so the no-overlap invariant is checked
// in one place. Every successful mutation publishes an immutable snapshot that
// the playback thread picks up without locking: lanes are stored behind `Arc`
// and copied on write, so a snapshot costs one pointer per lane.

use crate::sequencer::block::{Block, BlockId, LaneId};
use crate::sequencer::error::PlacementError;
use crate::sequencer::event::EventList;
use crate::sequencer::time::{Tick, TimeRange};
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Blocks of one lane, sorted by (start, id)
#[derive(Debug, Clone, Default)]
pub struct LaneBlocks {
    blocks: Vec<Arc<Block>>,
    /// Longest block duration in the lane, bounds the overlap search
    max_duration: Tick,
}

impl LaneBlocks {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().map(|b| b.as_ref())
    }

    /// Blocks with content in `range`, ordered by start
    pub fn overlapping(&self, range: TimeRange) -> impl Iterator<Item = &Block> {
        let max = self.max_duration;
        let lower = self.blocks.partition_point(|b| b.start() + max < range.start);
        let upper = self.blocks.partition_point(|b| b.start() < range.end);
        self.blocks[lower..upper.max(lower)]
            .iter()
            .map(|b| b.as_ref())
            .filter(move |b| b.intersects(&range))
    }

    fn position(&self, id: BlockId, start: Tick) -> Option<usize> {
        self.blocks
            .binary_search_by(|b| (b.start(), b.id()).cmp(&(start, id)))
            .ok()
    }

    fn get(&self, id: BlockId, start: Tick) -> Option<&Block> {
        self.position(id, start).map(|i| self.blocks[i].as_ref())
    }

    fn insert(&mut self, block: Block) {
        let key = (block.start(), block.id());
        let index = self.blocks.partition_point(|b| (b.start(), b.id()) < key);
        self.max_duration = self.max_duration.max(block.duration());
        self.blocks.insert(index, Arc::new(block));
    }

    fn remove(&mut self, id: BlockId, start: Tick) -> Option<Block> {
        let index = self.position(id, start)?;
        let removed = self.blocks.remove(index);
        if removed.duration() >= self.max_duration {
            self.max_duration = self
                .blocks
                .iter()
                .map(|b| b.duration())
                .max()
                .unwrap_or_default();
        }
        Some(Arc::unwrap_or_clone(removed))
    }

    /// First block overlapping `candidate`, ignoring `skip`
    fn conflict(&self, candidate: &Block, skip: impl Fn(BlockId) -> bool) -> Option<BlockId> {
        self.overlapping(candidate.span())
            .filter(|b| b.id() != candidate.id() && !skip(b.id()))
            .find(|b| b.overlaps(candidate))
            .map(|b| b.id())
    }

    fn successor_of(&self, start: Tick, id: BlockId) -> Option<&Block> {
        let index = self
            .blocks
            .partition_point(|b| (b.start(), b.id()) <= (start, id));
        self.blocks.get(index).map(|b| b.as_ref())
    }

    fn predecessor_of(&self, start: Tick, id: BlockId) -> Option<&Block> {
        let index = self.blocks.partition_point(|b| (b.start(), b.id()) < (start, id));
        index
            .checked_sub(1)
            .and_then(|i| self.blocks.get(i))
            .map(|b| b.as_ref())
    }
}

/// Immutable, consistent view of the arrangement
#[derive(Debug, Default)]
pub struct TimelineSnapshot {
    version: u64,
    lanes: BTreeMap<LaneId, Arc<LaneBlocks>>,
}

impl TimelineSnapshot {
    /// Increases with every published mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn lanes(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.lanes.keys().copied()
    }

    pub fn blocks_overlapping(
        &self,
        lane: LaneId,
        range: TimeRange,
    ) -> impl Iterator<Item = &Block> {
        self.lanes
            .get(&lane)
            .into_iter()
            .flat_map(move |blocks| blocks.overlapping(range))
    }

    pub fn block_count(&self) -> usize {
        self.lanes.values().map(|l| l.len()).sum()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.lanes.values().any(|l| l.iter().any(|b| b.id() == id))
    }
}

/// Playback-side handle to the latest published snapshot
#[derive(Clone)]
pub struct TimelineReader {
    shared: Arc<ArcSwap<TimelineSnapshot>>,
}

impl TimelineReader {
    /// Latest snapshot; never blocks
    pub fn snapshot(&self) -> Arc<TimelineSnapshot> {
        self.shared.load_full()
    }
}

/// Mutation record consumed by the layout engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineChange {
    Inserted {
        id: BlockId,
        lane: LaneId,
        start: Tick,
    },
    Moved {
        id: BlockId,
        from_lane: LaneId,
        from_start: Tick,
        to_lane: LaneId,
        to_start: Tick,
    },
    Removed {
        id: BlockId,
        lane: LaneId,
        start: Tick,
    },
    /// Length changed in place
    Resized {
        id: BlockId,
        lane: LaneId,
        start: Tick,
    },
}

/// Editing-side arrangement state
pub struct Timeline {
    lanes: BTreeMap<LaneId, Arc<LaneBlocks>>,
    /// Lane and start of every placed block
    locations: HashMap<BlockId, (LaneId, Tick)>,
    /// Tracked blocks not yet put on a lane; their lane and start are stale
    unplaced: HashMap<BlockId, Block>,
    join_candidates: HashSet<BlockId>,
    next_id: u64,
    version: u64,
    changes: Vec<TimelineChange>,
    published: Arc<ArcSwap<TimelineSnapshot>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            lanes: BTreeMap::new(),
            locations: HashMap::new(),
            unplaced: HashMap::new(),
            join_candidates: HashSet::new(),
            next_id: 1,
            version: 0,
            changes: Vec::new(),
            published: Arc::new(ArcSwap::from_pointee(TimelineSnapshot::default())),
        }
    }

    /// Reserve a fresh block id
    pub fn allocate_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Track a new block without putting it on a lane yet
    pub fn create_block(&mut self, events: EventList) -> BlockId {
        let id = self.allocate_id();
        self.unplaced
            .insert(id, Block::new(id, 0, Tick::ZERO, events));
        trace!(block = %id, "block created");
        id
    }

    /// Put a tracked block on `lane` at `start`
    ///
    /// Also moves an already placed block, including across lanes.
    pub fn place(&mut self, id: BlockId, lane: LaneId, start: Tick) -> Result<(), PlacementError> {
        if let Some(stored) = self.unplaced.get(&id) {
            let block = stored.placed_at(lane, start);
            self.check_free(&block)?;
            self.unplaced.remove(&id);
            self.insert_placed(block);
            self.changes.push(TimelineChange::Inserted { id, lane, start });
            debug!(block = %id, lane, start = %start, "block placed");
            self.publish();
            return Ok(());
        }

        let (from_lane, from_start) = self.location(id)?;
        let current = self.placed(id, from_lane, from_start)?;
        let moved = current.placed_at(lane, start);
        self.check_free(&moved)?;

        self.take_placed(id, from_lane, from_start);
        self.insert_placed(moved);
        self.changes.push(TimelineChange::Moved {
            id,
            from_lane,
            from_start,
            to_lane: lane,
            to_start: start,
        });
        debug!(block = %id, from_lane, lane, start = %start, "block placed");
        self.publish();
        Ok(())
    }

    /// Shift a placed block along its lane
    pub fn move_block(&mut self, id: BlockId, new_start: Tick) -> Result<(), PlacementError> {
        let (lane, start) = self.location(id)?;
        if start == new_start {
            return Ok(());
        }
        self.place(id, lane, new_start)
    }

    /// Run a placed block for `length`, repeating or cutting its content.
    /// `None` restores the content length.
    pub fn set_length(&mut self, id: BlockId, length: Option<Tick>) -> Result<(), PlacementError> {
        if length == Some(Tick::ZERO) {
            return Err(PlacementError::ZeroLength(id));
        }
        let (lane, start) = self.location(id)?;
        let resized = self.placed(id, lane, start)?.clone().with_length(length);
        self.check_free(&resized)?;

        let repetitions = resized.repetitions();
        self.take_placed(id, lane, start);
        self.insert_placed(resized);
        self.changes
            .push(TimelineChange::Resized { id, lane, start });
        debug!(block = %id, length = ?length, repetitions, "block resized");
        self.publish();
        Ok(())
    }

    /// Signed shift that lands `start`, or the block's end when moved there,
    /// on the nearest boundary or event of another block within `window`
    ///
    /// `None` when nothing is in reach or an edge is already aligned.
    pub fn snap_delta(&self, id: BlockId, start: Tick, window: Tick) -> Option<i64> {
        let duration = self.block(id)?.duration();
        let mut best: Option<i64> = None;

        for edge in [start, start + duration] {
            let reach = TimeRange::new(edge.saturating_sub(window), edge + window + Tick(1));
            for lane in self.lanes() {
                for block in self.blocks_overlapping(lane, reach).filter(|b| b.id() != id) {
                    let local = TimeRange::new(
                        reach.start.saturating_sub(block.start()),
                        reach.end.saturating_sub(block.start()),
                    );
                    let events = block
                        .rendered()
                        .events_in(local)
                        .iter()
                        .map(|e| block.start() + e.time);
                    for point in [block.start(), block.end()].into_iter().chain(events) {
                        let delta = edge.delta_to(point);
                        if delta == 0 {
                            return None;
                        }
                        if delta.unsigned_abs() > window.0 || start.0 as i64 + delta < 0 {
                            continue;
                        }
                        if best.is_none_or(|b| delta.unsigned_abs() < b.unsigned_abs()) {
                            best = Some(delta);
                        }
                    }
                }
            }
        }
        best
    }

    /// Create and place in one step. Nothing is tracked on failure.
    pub fn insert(
        &mut self,
        lane: LaneId,
        start: Tick,
        events: EventList,
    ) -> Result<BlockId, PlacementError> {
        let id = self.create_block(events);
        if let Err(e) = self.place(id, lane, start) {
            self.unplaced.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Place a block that carries its own id, e.g. one restored by undo
    pub fn insert_block(&mut self, block: Block) -> Result<(), PlacementError> {
        if self.is_tracked(block.id()) {
            return Err(PlacementError::DuplicateBlock(block.id()));
        }
        self.check_free(&block)?;
        let (id, lane, start) = (block.id(), block.lane(), block.start());
        self.next_id = self.next_id.max(id.0 + 1);
        self.insert_placed(block);
        self.changes.push(TimelineChange::Inserted { id, lane, start });
        self.publish();
        Ok(())
    }

    /// Stop tracking a block and hand it back
    pub fn remove(&mut self, id: BlockId) -> Result<Block, PlacementError> {
        if let Some(block) = self.unplaced.remove(&id) {
            return Ok(block);
        }
        let (lane, start) = self.location(id)?;
        let block = self
            .take_placed(id, lane, start)
            .ok_or(PlacementError::UnknownBlock(id))?;
        self.join_candidates.remove(&id);
        self.changes.push(TimelineChange::Removed { id, lane, start });
        debug!(block = %id, lane, "block removed");
        self.publish();
        Ok(block)
    }

    /// Take a block off its lane. It stays tracked and can be placed again.
    pub fn unplace(&mut self, id: BlockId) -> Result<(), PlacementError> {
        let (lane, start) = self.location(id)?;
        let block = self
            .take_placed(id, lane, start)
            .ok_or(PlacementError::UnknownBlock(id))?;
        self.join_candidates.remove(&id);
        self.unplaced.insert(id, block);
        self.changes.push(TimelineChange::Removed { id, lane, start });
        self.publish();
        Ok(())
    }

    /// Atomically swap `old_ids` for `new_blocks`
    ///
    /// Either every old block is removed and every new block placed, or the
    /// Timeline is left unchanged. Readers see one snapshot or the other.
    pub fn replace(
        &mut self,
        old_ids: &[BlockId],
        new_blocks: Vec<Block>,
    ) -> Result<Vec<Block>, PlacementError> {
        let mut retired = Vec::with_capacity(old_ids.len());
        for id in old_ids {
            let (lane, start) = self.location(*id)?;
            retired.push((*id, lane, start));
        }

        let mut seen = HashSet::new();
        for block in &new_blocks {
            let reused = old_ids.contains(&block.id());
            if !seen.insert(block.id()) || (self.is_tracked(block.id()) && !reused) {
                return Err(PlacementError::DuplicateBlock(block.id()));
            }
        }

        // Stage the affected lanes so a failure leaves `self.lanes` untouched
        let mut staged: BTreeMap<LaneId, LaneBlocks> = BTreeMap::new();
        let mut removed = Vec::with_capacity(retired.len());
        for (id, lane, start) in &retired {
            let lane_blocks = staged
                .entry(*lane)
                .or_insert_with(|| self.lanes.get(lane).map(|l| (**l).clone()).unwrap_or_default());
            let block = lane_blocks
                .remove(*id, *start)
                .ok_or(PlacementError::UnknownBlock(*id))?;
            removed.push(block);
        }
        for block in &new_blocks {
            let lane = block.lane();
            let lane_blocks = staged
                .entry(lane)
                .or_insert_with(|| self.lanes.get(&lane).map(|l| (**l).clone()).unwrap_or_default());
            let candidates = &self.join_candidates;
            let flagged = candidates.contains(&block.id());
            if let Some(conflicting) =
                lane_blocks.conflict(block, |other| flagged && candidates.contains(&other))
            {
                return Err(PlacementError::Overlap {
                    block: block.id(),
                    conflicting,
                    lane,
                });
            }
            lane_blocks.insert(block.clone());
        }

        // Commit
        for (lane, lane_blocks) in staged {
            if lane_blocks.is_empty() {
                self.lanes.remove(&lane);
            } else {
                self.lanes.insert(lane, Arc::new(lane_blocks));
            }
        }
        for (id, lane, start) in retired {
            self.locations.remove(&id);
            self.join_candidates.remove(&id);
            self.changes.push(TimelineChange::Removed { id, lane, start });
        }
        for block in &new_blocks {
            self.locations
                .insert(block.id(), (block.lane(), block.start()));
            self.next_id = self.next_id.max(block.id().0 + 1);
            self.changes.push(TimelineChange::Inserted {
                id: block.id(),
                lane: block.lane(),
                start: block.start(),
            });
        }
        debug!(
            removed = removed.len(),
            added = new_blocks.len(),
            "blocks replaced"
        );
        self.publish();
        Ok(removed)
    }

    /// Swap `old_ids` for `blocks` that were join candidates when they left
    /// the Timeline. They come back flagged, so they may overlap again.
    pub fn restore_candidates(
        &mut self,
        old_ids: &[BlockId],
        blocks: Vec<Block>,
    ) -> Result<Vec<Block>, PlacementError> {
        let ids: Vec<BlockId> = blocks.iter().map(|b| b.id()).collect();
        self.join_candidates.extend(ids.iter().copied());
        let result = self.replace(old_ids, blocks);
        if result.is_err() {
            for id in &ids {
                self.join_candidates.remove(id);
            }
        }
        result
    }

    /// Flag blocks as join participants; they may overlap each other
    /// until the flags are cleared
    pub fn mark_join_candidates(&mut self, ids: &[BlockId]) -> Result<(), PlacementError> {
        for id in ids {
            self.location(*id)?;
        }
        self.join_candidates.extend(ids.iter().copied());
        Ok(())
    }

    /// Drop every join flag
    ///
    /// Fails with `Overlap`, keeping the flags, while a flagged block still
    /// overlaps another block of its lane. Move or join it first.
    pub fn clear_join_candidates(&mut self) -> Result<(), PlacementError> {
        let mut flagged: Vec<BlockId> = self.join_candidates.iter().copied().collect();
        flagged.sort_unstable();
        for id in flagged {
            let Some(block) = self.block(id) else {
                continue;
            };
            let conflict = self
                .lanes
                .get(&block.lane())
                .and_then(|lane_blocks| lane_blocks.conflict(block, |_| false));
            if let Some(conflicting) = conflict {
                return Err(PlacementError::Overlap {
                    block: id,
                    conflicting,
                    lane: block.lane(),
                });
            }
        }
        self.join_candidates.clear();
        Ok(())
    }

    pub fn is_join_candidate(&self, id: BlockId) -> bool {
        self.join_candidates.contains(&id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        let (lane, start) = self.locations.get(&id)?;
        self.lanes.get(lane)?.get(id, *start)
    }

    pub fn is_tracked(&self, id: BlockId) -> bool {
        self.locations.contains_key(&id) || self.unplaced.contains_key(&id)
    }

    /// Blocks of `lane` with content in `range`, ordered by start
    pub fn blocks_overlapping(
        &self,
        lane: LaneId,
        range: TimeRange,
    ) -> impl Iterator<Item = &Block> {
        self.lanes
            .get(&lane)
            .into_iter()
            .flat_map(move |blocks| blocks.overlapping(range))
    }

    pub fn lane_blocks(&self, lane: LaneId) -> impl Iterator<Item = &Block> {
        self.lanes.get(&lane).into_iter().flat_map(|l| l.iter())
    }

    pub fn lanes(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.lanes.keys().copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.lanes.values().flat_map(|l| l.iter())
    }

    pub fn block_count(&self) -> usize {
        self.locations.len()
    }

    /// Next block in the same lane
    pub fn successor(&self, id: BlockId) -> Option<&Block> {
        let (lane, start) = self.locations.get(&id)?;
        self.lanes.get(lane)?.successor_of(*start, id)
    }

    /// Previous block in the same lane
    pub fn predecessor(&self, id: BlockId) -> Option<&Block> {
        let (lane, start) = self.locations.get(&id)?;
        self.lanes.get(lane)?.predecessor_of(*start, id)
    }

    /// First block in `lane` ordered after position (`start`, `id`)
    pub fn successor_at(&self, lane: LaneId, start: Tick, id: BlockId) -> Option<&Block> {
        self.lanes.get(&lane)?.successor_of(start, id)
    }

    /// End of the last block across all lanes
    pub fn duration(&self) -> Tick {
        self.blocks().map(|b| b.end()).max().unwrap_or_default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Drain change records accumulated since the last call
    pub fn take_changes(&mut self) -> Vec<TimelineChange> {
        std::mem::take(&mut self.changes)
    }

    /// Handle for the playback thread
    pub fn reader(&self) -> TimelineReader {
        TimelineReader {
            shared: Arc::clone(&self.published),
        }
    }

    pub fn snapshot(&self) -> Arc<TimelineSnapshot> {
        self.published.load_full()
    }

    fn location(&self, id: BlockId) -> Result<(LaneId, Tick), PlacementError> {
        match self.locations.get(&id) {
            Some(location) => Ok(*location),
            None if self.unplaced.contains_key(&id) => Err(PlacementError::Unplaced(id)),
            None => Err(PlacementError::UnknownBlock(id)),
        }
    }

    fn placed(&self, id: BlockId, lane: LaneId, start: Tick) -> Result<&Block, PlacementError> {
        self.lanes
            .get(&lane)
            .and_then(|l| l.get(id, start))
            .ok_or(PlacementError::UnknownBlock(id))
    }

    fn check_free(&self, block: &Block) -> Result<(), PlacementError> {
        let Some(lane_blocks) = self.lanes.get(&block.lane()) else {
            return Ok(());
        };
        // Only two flagged blocks may overlap each other
        let candidates = &self.join_candidates;
        let flagged = candidates.contains(&block.id());
        match lane_blocks.conflict(block, |other| flagged && candidates.contains(&other)) {
            Some(conflicting) => Err(PlacementError::Overlap {
                block: block.id(),
                conflicting,
                lane: block.lane(),
            }),
            None => Ok(()),
        }
    }

    fn insert_placed(&mut self, block: Block) {
        self.locations
            .insert(block.id(), (block.lane(), block.start()));
        Arc::make_mut(self.lanes.entry(block.lane()).or_default()).insert(block);
    }

    fn take_placed(&mut self, id: BlockId, lane: LaneId, start: Tick) -> Option<Block> {
        let lane_blocks = self.lanes.get_mut(&lane)?;
        let block = Arc::make_mut(lane_blocks).remove(id, start)?;
        if lane_blocks.is_empty() {
            self.lanes.remove(&lane);
        }
        self.locations.remove(&id);
        Some(block)
    }

    fn publish(&mut self) {
        self.version += 1;
        self.published.store(Arc::new(TimelineSnapshot {
            version: self.version,
            lanes: self.lanes.clone(),
        }));
        trace!(version = self.version, "timeline snapshot published");
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::event::Event;

    fn events(length: u64) -> EventList {
        EventList::builder()
            .push(Event::note_on(0u64, 60, 100))
            .push(Event::note_off(length.saturating_sub(1), 60))
            .with_length(Tick(length))
            .finish()
            .unwrap()
    }

    #[test]
    fn test_insert_and_query() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let b = timeline.insert(0, Tick(4), events(2)).unwrap();

        let found: Vec<BlockId> = timeline
            .blocks_overlapping(0, TimeRange::new(Tick(0), Tick(10)))
            .map(|b| b.id())
            .collect();
        assert_eq!(found, vec![a, b]);
        assert_eq!(timeline.duration(), Tick(6));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();

        let result = timeline.insert(0, Tick(3), events(2));
        assert!(matches!(
            result,
            Err(PlacementError::Overlap { conflicting, lane: 0, .. }) if conflicting == a
        ));
        assert_eq!(timeline.block_count(), 1);
        assert!(!timeline.is_tracked(BlockId(2)));
    }

    #[test]
    fn test_other_lane_does_not_conflict() {
        let mut timeline = Timeline::new();
        timeline.insert(0, Tick(0), events(4)).unwrap();
        assert!(timeline.insert(1, Tick(0), events(4)).is_ok());
    }

    #[test]
    fn test_move_block() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let b = timeline.insert(0, Tick(10), events(4)).unwrap();
        timeline.take_changes();

        assert!(timeline.move_block(a, Tick(8)).is_err());
        timeline.move_block(a, Tick(20)).unwrap();

        assert_eq!(timeline.block(a).map(|b| b.start()), Some(Tick(20)));
        assert_eq!(timeline.predecessor(a).map(|b| b.id()), Some(b));
        assert_eq!(
            timeline.take_changes(),
            vec![TimelineChange::Moved {
                id: a,
                from_lane: 0,
                from_start: Tick(0),
                to_lane: 0,
                to_start: Tick(20),
            }]
        );
    }

    #[test]
    fn test_place_unknown_block() {
        let mut timeline = Timeline::new();
        assert_eq!(
            timeline.place(BlockId(99), 0, Tick(0)),
            Err(PlacementError::UnknownBlock(BlockId(99)))
        );
        assert_eq!(
            timeline.move_block(BlockId(99), Tick(0)),
            Err(PlacementError::UnknownBlock(BlockId(99)))
        );
    }

    #[test]
    fn test_create_then_place() {
        let mut timeline = Timeline::new();
        let id = timeline.create_block(events(4));

        assert!(timeline.is_tracked(id));
        assert_eq!(
            timeline.move_block(id, Tick(2)),
            Err(PlacementError::Unplaced(id))
        );
        timeline.place(id, 2, Tick(8)).unwrap();
        assert_eq!(timeline.block(id).map(|b| b.lane()), Some(2));

        timeline.unplace(id).unwrap();
        assert!(timeline.block(id).is_none());
        assert!(timeline.is_tracked(id));
        assert_eq!(timeline.move_block(id, Tick(0)), Err(PlacementError::Unplaced(id)));
    }

    #[test]
    fn test_zero_duration_blocks_never_overlap() {
        let mut timeline = Timeline::new();
        timeline.insert(0, Tick(0), events(10)).unwrap();
        let point = EventList::from_events([Event::note_on(0u64, 61, 100)]).unwrap();
        assert!(timeline.insert(0, Tick(5), point).is_ok());
    }

    #[test]
    fn test_join_candidates_may_overlap() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let b = timeline.insert(0, Tick(4), events(4)).unwrap();

        timeline.mark_join_candidates(&[a, b]).unwrap();
        timeline.move_block(b, Tick(2)).unwrap();

        // Flags stay while the overlap is unresolved
        assert_eq!(
            timeline.clear_join_candidates(),
            Err(PlacementError::Overlap {
                block: a,
                conflicting: b,
                lane: 0
            })
        );
        assert!(timeline.is_join_candidate(a));

        timeline.move_block(b, Tick(4)).unwrap();
        timeline.clear_join_candidates().unwrap();
        assert!(!timeline.is_join_candidate(b));
        assert!(timeline.move_block(b, Tick(3)).is_err());
    }

    #[test]
    fn test_candidate_cannot_land_on_unflagged_block() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let b = timeline.insert(0, Tick(4), events(4)).unwrap();
        let c = timeline.insert(0, Tick(20), events(4)).unwrap();
        timeline.mark_join_candidates(&[a, b]).unwrap();

        assert_eq!(
            timeline.move_block(b, Tick(21)),
            Err(PlacementError::Overlap {
                block: b,
                conflicting: c,
                lane: 0
            })
        );
        // Nor can an unflagged block land on a candidate
        assert!(timeline.move_block(c, Tick(1)).is_err());
        assert_eq!(timeline.block(b).map(|b| b.start()), Some(Tick(4)));
        timeline.clear_join_candidates().unwrap();
    }

    #[test]
    fn test_set_length_repeats_and_checks_room() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        timeline.insert(0, Tick(12), events(4)).unwrap();
        timeline.take_changes();

        timeline.set_length(a, Some(Tick(12))).unwrap();
        let block = timeline.block(a).unwrap();
        assert_eq!(block.end(), Tick(12));
        assert_eq!(block.repetitions(), 3);
        assert_eq!(
            timeline.take_changes(),
            vec![TimelineChange::Resized {
                id: a,
                lane: 0,
                start: Tick(0)
            }]
        );

        assert!(matches!(
            timeline.set_length(a, Some(Tick(13))),
            Err(PlacementError::Overlap { .. })
        ));
        assert_eq!(timeline.set_length(a, Some(Tick::ZERO)), Err(PlacementError::ZeroLength(a)));
        assert_eq!(timeline.block(a).map(|b| b.end()), Some(Tick(12)));

        timeline.set_length(a, None).unwrap();
        assert_eq!(timeline.block(a).map(|b| b.end()), Some(Tick(4)));
    }

    #[test]
    fn test_unplaced_block_keeps_length() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        timeline.set_length(a, Some(Tick(8))).unwrap();

        timeline.unplace(a).unwrap();
        timeline.place(a, 1, Tick(100)).unwrap();
        assert_eq!(timeline.block(a).map(|b| b.span()), Some(TimeRange::new(Tick(100), Tick(108))));
    }

    #[test]
    fn test_snap_delta() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(100)).unwrap();
        timeline.insert(1, Tick(500), events(100)).unwrap();

        // Start pulled back onto the other block's start
        assert_eq!(timeline.snap_delta(a, Tick(510), Tick(20)), Some(-10));
        // End pushed onto it
        assert_eq!(timeline.snap_delta(a, Tick(395), Tick(20)), Some(5));
        // End onto the other block's last event, nearer than its start
        assert_eq!(timeline.snap_delta(a, Tick(498), Tick(2)), Some(1));
        assert_eq!(timeline.snap_delta(a, Tick(300), Tick(20)), None);
        // Already aligned
        assert_eq!(timeline.snap_delta(a, Tick(500), Tick(20)), None);
    }

    #[test]
    fn test_replace_is_all_or_nothing() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let b = timeline.insert(0, Tick(4), events(4)).unwrap();
        timeline.insert(0, Tick(8), events(4)).unwrap();
        let version = timeline.version();

        // Replacement spills into the third block
        let id = timeline.allocate_id();
        let too_long = Block::new(id, 0, Tick(0), events(10));
        assert!(timeline.replace(&[a, b], vec![too_long]).is_err());
        assert_eq!(timeline.version(), version);
        assert!(timeline.block(a).is_some());
        assert!(timeline.block(b).is_some());

        let id = timeline.allocate_id();
        let joined = Block::new(id, 0, Tick(0), events(8));
        let removed = timeline.replace(&[a, b], vec![joined]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(timeline.block(a).is_none());
        assert_eq!(timeline.block(id).map(|b| b.end()), Some(Tick(8)));
    }

    #[test]
    fn test_replace_rejects_id_in_use() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();
        let other = timeline.insert(1, Tick(0), events(4)).unwrap();

        let clash = Block::new(other, 0, Tick(0), events(4));
        assert_eq!(
            timeline.replace(&[a], vec![clash]),
            Err(PlacementError::DuplicateBlock(other))
        );
    }

    #[test]
    fn test_snapshot_isolated_from_later_edits() {
        let mut timeline = Timeline::new();
        let reader = timeline.reader();
        let a = timeline.insert(0, Tick(0), events(4)).unwrap();

        let before = reader.snapshot();
        timeline.move_block(a, Tick(100)).unwrap();
        let after = reader.snapshot();

        let range = TimeRange::new(Tick(0), Tick(4));
        assert_eq!(before.blocks_overlapping(0, range).count(), 1);
        assert_eq!(after.blocks_overlapping(0, range).count(), 0);
        assert!(after.version() > before.version());
    }

    #[test]
    fn test_remove_returns_block() {
        let mut timeline = Timeline::new();
        let a = timeline.insert(3, Tick(7), events(4)).unwrap();
        let block = timeline.remove(a).unwrap();

        assert_eq!(block.lane(), 3);
        assert_eq!(block.start(), Tick(7));
        assert!(timeline.lanes().next().is_none());
        assert_eq!(timeline.remove(a), Err(PlacementError::UnknownBlock(a)));
    }
}
