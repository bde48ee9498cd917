// BlockJoiner - Merge blocks of one lane into a single replacement block
//
// Every event of every input survives the merge untouched apart from its
// timestamp, which is rebased onto the merged block's start. Bend and
// pressure events go through exactly the same path as notes.

use crate::sequencer::block::{Block, BlockId};
use crate::sequencer::error::{JoinError, PlacementError};
use crate::sequencer::event::{Event, EventKind, EventList, MIDI_DATA_MAX};
use crate::sequencer::time::{Tick, TimeRange};
use crate::sequencer::timeline::Timeline;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, warn};

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub joined: BlockId,
    /// Input blocks as they were before the join, ordered by start
    pub retired: Vec<Block>,
}

/// Result of splitting a repeating block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    /// One block per pass, ordered by start
    pub parts: Vec<BlockId>,
    pub retired: Block,
}

pub struct BlockJoiner;

impl BlockJoiner {
    /// Join `ids` into one block and swap it into the Timeline
    ///
    /// On any error the Timeline is unchanged.
    pub fn join(timeline: &mut Timeline, ids: &[BlockId]) -> Result<JoinOutcome, JoinError> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let result = Self::build(timeline, ids).and_then(|joined| {
            let id = joined.id();
            let retired = timeline.replace(&unique, vec![joined])?;
            Ok((id, retired))
        });

        match result {
            Ok((joined, mut retired)) => {
                retired.sort_by_key(|b| (b.start(), b.id()));
                debug!(block = %joined, inputs = ids.len(), "blocks joined");
                Ok(JoinOutcome { joined, retired })
            }
            Err(e) => {
                warn!(error = %e, "join rejected");
                Err(e)
            }
        }
    }

    /// Build the merged block without touching the Timeline
    ///
    /// The returned block carries a freshly allocated id.
    pub fn build(timeline: &mut Timeline, ids: &[BlockId]) -> Result<Block, JoinError> {
        let (lane, start, events) = {
            let inputs = Self::inputs(timeline, ids)?;
            let span = Self::merged_span(&inputs)?;
            (inputs[0].lane(), span.start, Self::merge_inputs(&inputs, span)?)
        };
        Ok(Block::new(timeline.allocate_id(), lane, start, events))
    }

    /// Replace a repeating block by one playing the same events in one pass
    pub fn join_repeats(timeline: &mut Timeline, id: BlockId) -> Result<JoinOutcome, JoinError> {
        let block = placed_block(timeline, id)?;
        if block.repetitions() < 2 {
            return Err(JoinError::NotRepeating(id));
        }

        let unrolled = Block::new(
            timeline.allocate_id(),
            block.lane(),
            block.start(),
            block.rendered().clone(),
        );
        let joined = unrolled.id();
        let retired = timeline.replace(&[id], vec![unrolled])?;
        debug!(block = %id, joined = %joined, passes = block.repetitions(), "repeats joined");
        Ok(JoinOutcome { joined, retired })
    }

    /// Replace a repeating block by one block per pass. The last part is cut
    /// short when the block ends partway through a pass.
    pub fn split_repeats(timeline: &mut Timeline, id: BlockId) -> Result<SplitOutcome, JoinError> {
        let block = placed_block(timeline, id)?;
        let passes = block.repetitions();
        if passes < 2 {
            return Err(JoinError::NotRepeating(id));
        }

        let period = block.repeat_time();
        let mut parts = Vec::with_capacity(passes as usize);
        for pass in 0..passes {
            let offset = Tick(pass * period.0);
            let remaining = block.duration() - offset;
            let part = Block::new(
                timeline.allocate_id(),
                block.lane(),
                block.start() + offset,
                block.events().clone(),
            )
            .with_length(Some(remaining.min(period)));
            parts.push(part);
        }

        let ids = parts.iter().map(|b| b.id()).collect();
        let mut retired = timeline.replace(&[id], parts)?;
        debug!(block = %id, parts = passes, "repeats split");
        Ok(SplitOutcome {
            parts: ids,
            retired: retired.pop().ok_or(PlacementError::UnknownBlock(id))?,
        })
    }

    /// Merged EventList for `ids`, relative to the start of their union
    pub fn merge(timeline: &Timeline, ids: &[BlockId]) -> Result<EventList, JoinError> {
        let inputs = Self::inputs(timeline, ids)?;
        let span = Self::merged_span(&inputs)?;
        Self::merge_inputs(&inputs, span)
    }

    /// A note left held at the end of one input is released there when a
    /// later input starts the same pitch. Overlapping inputs get no such
    /// release and fail on the double NoteOn instead.
    fn merge_inputs(inputs: &[&Block], span: TimeRange) -> Result<EventList, JoinError> {
        let ends: Vec<Tick> = inputs.iter().map(|b| b.end() - span.start).collect();
        // Input whose NoteOn is still open, per pitch
        let mut held: [Option<usize>; MIDI_DATA_MAX as usize + 1] = [None; MIDI_DATA_MAX as usize + 1];

        let mut builder = EventList::builder();
        for (input, event) in merge_sorted(inputs, span.start) {
            let slot = event.kind.pitch().and_then(|p| held.get_mut(p as usize));
            match (event.kind, slot) {
                (EventKind::NoteOn { pitch, .. }, Some(slot)) => {
                    let ended = (*slot).filter(|owner| *owner != input && ends[*owner] <= event.time);
                    if let Some(owner) = ended {
                        builder.push(Event::note_off(ends[owner], pitch));
                    }
                    *slot = Some(input);
                }
                (EventKind::NoteOff { .. }, Some(slot)) => *slot = None,
                _ => {}
            }
            builder.push_sorted(event);
        }
        builder.with_length(span.length());
        Ok(builder.finish()?)
    }

    /// Validated inputs ordered by (start, id)
    fn inputs<'a>(timeline: &'a Timeline, ids: &[BlockId]) -> Result<Vec<&'a Block>, JoinError> {
        if ids.len() < 2 {
            return Err(JoinError::NotEnoughBlocks(ids.len()));
        }

        let mut blocks = Vec::with_capacity(ids.len());
        for id in ids {
            match timeline.block(*id) {
                Some(block) => blocks.push(block),
                None if timeline.is_tracked(*id) => {
                    return Err(PlacementError::Unplaced(*id).into());
                }
                None => return Err(PlacementError::UnknownBlock(*id).into()),
            }
        }

        let first = blocks[0].lane();
        if let Some(other) = blocks.iter().map(|b| b.lane()).find(|lane| *lane != first) {
            return Err(JoinError::CrossLaneJoin { first, other });
        }

        blocks.sort_by_key(|b| (b.start(), b.id()));
        blocks.dedup_by_key(|b| b.id());
        if blocks.len() < 2 {
            return Err(JoinError::NotEnoughBlocks(blocks.len()));
        }
        Ok(blocks)
    }

    /// Union of the input spans; fails on the first gap
    fn merged_span(inputs: &[&Block]) -> Result<TimeRange, JoinError> {
        let mut covered = inputs[0].span();
        for block in &inputs[1..] {
            if block.start() > covered.end {
                return Err(JoinError::NonContiguousJoin {
                    gap: TimeRange::new(covered.end, block.start()),
                });
            }
            covered = covered.union(&block.span());
        }
        Ok(covered)
    }
}

fn placed_block(timeline: &Timeline, id: BlockId) -> Result<Block, JoinError> {
    match timeline.block(id) {
        Some(block) => Ok(block.clone()),
        None if timeline.is_tracked(id) => Err(PlacementError::Unplaced(id).into()),
        None => Err(PlacementError::UnknownBlock(id).into()),
    }
}

/// Heap entry: next pending event of one input
#[derive(Debug, PartialEq, Eq)]
struct Cursor {
    time: Tick,
    input: usize,
    index: usize,
}

impl Ord for Cursor {
    // Reversed for a min-heap; ties go to the earlier input, then earlier index
    fn cmp(&self, other: &Self) -> Ordering {
        (other.time, other.input, other.index).cmp(&(self.time, self.input, self.index))
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stable k-way merge of the played inputs rebased onto `origin`,
/// each event tagged with its input
fn merge_sorted(inputs: &[&Block], origin: Tick) -> Vec<(usize, Event)> {
    let total = inputs.iter().map(|b| b.rendered().len()).sum();
    let mut merged = Vec::with_capacity(total);
    let offsets: Vec<Tick> = inputs.iter().map(|b| b.start() - origin).collect();

    let mut heap = BinaryHeap::with_capacity(inputs.len());
    for (input, block) in inputs.iter().enumerate() {
        if let Some(first) = block.rendered().events().first() {
            heap.push(Cursor {
                time: first.time + offsets[input],
                input,
                index: 0,
            });
        }
    }

    while let Some(Cursor { input, index, .. }) = heap.pop() {
        let events = inputs[input].rendered().events();
        merged.push((input, events[index].shifted(offsets[input])));
        if let Some(next) = events.get(index + 1) {
            heap.push(Cursor {
                time: next.time + offsets[input],
                input,
                index: index + 1,
            });
        }
    }

    merged
}
