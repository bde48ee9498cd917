// Concrete command implementations
//
// Each command stores just enough to reverse itself. Redo replays the
// recorded result (same ids, same blocks) rather than recomputing it, so a
// redo never allocates fresh block ids.

use crate::command::state::EditorState;
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::sequencer::block::{Block, BlockId, LaneId};
use crate::sequencer::error::PlacementError;
use crate::sequencer::event::EventList;
use crate::sequencer::joiner::BlockJoiner;
use crate::sequencer::time::Tick;
use crate::sequencer::timeline::Timeline;
use std::any::Any;

fn placed(timeline: &Timeline, id: BlockId) -> Result<&Block, PlacementError> {
    match timeline.block(id) {
        Some(block) => Ok(block),
        None if timeline.is_tracked(id) => Err(PlacementError::Unplaced(id)),
        None => Err(PlacementError::UnknownBlock(id)),
    }
}

/// Create a block and put it on a lane
pub struct InsertBlockCommand {
    lane: LaneId,
    start: Tick,
    events: EventList,
    inserted: Option<BlockId>,
}

impl InsertBlockCommand {
    pub fn new(lane: LaneId, start: Tick, events: EventList) -> Self {
        Self {
            lane,
            start,
            events,
            inserted: None,
        }
    }

    /// Id of the block once the command has run
    pub fn inserted(&self) -> Option<BlockId> {
        self.inserted
    }
}

impl UndoableCommand for InsertBlockCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        match self.inserted {
            None => {
                let id = state
                    .timeline
                    .insert(self.lane, self.start, self.events.clone())?;
                self.inserted = Some(id);
            }
            Some(id) => {
                let block = Block::new(id, self.lane, self.start, self.events.clone());
                state.timeline.insert_block(block)?;
            }
        }
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let id = self
            .inserted
            .ok_or_else(|| CommandError::UndoFailed("Block was never inserted".into()))?;
        state.timeline.remove(id)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Insert block on lane {} at {}", self.lane, self.start)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Take a placed block out of the arrangement
pub struct RemoveBlockCommand {
    id: BlockId,
    removed: Option<Block>,
}

impl RemoveBlockCommand {
    pub fn new(id: BlockId) -> Self {
        Self { id, removed: None }
    }
}

impl UndoableCommand for RemoveBlockCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        placed(&state.timeline, self.id)?;
        self.removed = Some(state.timeline.remove(self.id)?);
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let block = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("No removed block stored".into()))?;
        if let Err(e) = state.timeline.insert_block(block.clone()) {
            self.removed = Some(block);
            return Err(e.into());
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove block {}", self.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Shift a block along its lane
///
/// Consecutive moves of the same block (a drag) collapse into one history
/// entry that undoes back to where the drag began.
pub struct MoveBlockCommand {
    id: BlockId,
    to: Tick,
    from: Option<Tick>,
    /// Snap reach, consumed on the first execute
    snap: Option<Tick>,
}

impl MoveBlockCommand {
    pub fn new(id: BlockId, to: Tick) -> Self {
        Self {
            id,
            to,
            from: None,
            snap: None,
        }
    }

    /// Move that lands on a block edge or event within `window`, if any
    pub fn snapped(id: BlockId, to: Tick, window: Option<Tick>) -> Self {
        Self {
            snap: window,
            ..Self::new(id, to)
        }
    }

    /// Target start, after snapping once executed
    pub fn target(&self) -> Tick {
        self.to
    }
}

impl UndoableCommand for MoveBlockCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let current = placed(&state.timeline, self.id)?.start();
        let delta = self
            .snap
            .take()
            .and_then(|window| state.timeline.snap_delta(self.id, self.to, window));
        if let Some(delta) = delta {
            self.to = self.to.offset(delta);
        }
        state.timeline.move_block(self.id, self.to)?;
        self.from.get_or_insert(current);
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let from = self
            .from
            .ok_or_else(|| CommandError::UndoFailed("No previous position stored".into()))?;
        state.timeline.move_block(self.id, from)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Move block {} to {}", self.id, self.to)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn can_merge_with(&self, other: &dyn UndoableCommand) -> bool {
        other
            .as_any()
            .downcast_ref::<MoveBlockCommand>()
            .is_some_and(|other| other.id == self.id)
    }

    fn merge_with(&mut self, other: Box<dyn UndoableCommand>) -> CommandResult<()> {
        let other = other
            .into_any()
            .downcast::<MoveBlockCommand>()
            .map_err(|_| CommandError::InvalidState("Merge with a different command".into()))?;
        self.to = other.to;
        Ok(())
    }
}

/// Put a tracked block on a lane, or move it to another lane
pub struct PlaceBlockCommand {
    id: BlockId,
    lane: LaneId,
    start: Tick,
    /// Outer `None` until executed; inner `None` if the block was unplaced
    previous: Option<Option<(LaneId, Tick)>>,
}

impl PlaceBlockCommand {
    pub fn new(id: BlockId, lane: LaneId, start: Tick) -> Self {
        Self {
            id,
            lane,
            start,
            previous: None,
        }
    }
}

impl UndoableCommand for PlaceBlockCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let previous = state.timeline.block(self.id).map(|b| (b.lane(), b.start()));
        state.timeline.place(self.id, self.lane, self.start)?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        match self.previous {
            Some(Some((lane, start))) => state.timeline.place(self.id, lane, start)?,
            Some(None) => state.timeline.unplace(self.id)?,
            None => return Err(CommandError::UndoFailed("Block was never placed".into())),
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Place block {} on lane {} at {}", self.id, self.lane, self.start)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Run a block longer than its content, which then repeats, or shorter
///
/// Consecutive resizes of the same block merge like moves.
pub struct SetBlockLengthCommand {
    id: BlockId,
    length: Option<Tick>,
    previous: Option<Option<Tick>>,
}

impl SetBlockLengthCommand {
    pub fn new(id: BlockId, length: Option<Tick>) -> Self {
        Self {
            id,
            length,
            previous: None,
        }
    }
}

impl UndoableCommand for SetBlockLengthCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let current = placed(&state.timeline, self.id)?.length();
        state.timeline.set_length(self.id, self.length)?;
        self.previous.get_or_insert(current);
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let previous = self
            .previous
            .ok_or_else(|| CommandError::UndoFailed("No previous length stored".into()))?;
        state.timeline.set_length(self.id, previous)?;
        Ok(())
    }

    fn description(&self) -> String {
        match self.length {
            Some(length) => format!("Set length of block {} to {}", self.id, length),
            None => format!("Reset length of block {}", self.id),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn can_merge_with(&self, other: &dyn UndoableCommand) -> bool {
        other
            .as_any()
            .downcast_ref::<SetBlockLengthCommand>()
            .is_some_and(|other| other.id == self.id)
    }

    fn merge_with(&mut self, other: Box<dyn UndoableCommand>) -> CommandResult<()> {
        let other = other
            .into_any()
            .downcast::<SetBlockLengthCommand>()
            .map_err(|_| CommandError::InvalidState("Merge with a different command".into()))?;
        self.length = other.length;
        Ok(())
    }
}

/// Unroll the passes of a repeating block into one block, or split them
/// into one block each
pub struct RepeatsCommand {
    id: BlockId,
    split: bool,
    added: Vec<Block>,
    retired: Vec<Block>,
}

impl RepeatsCommand {
    pub fn join(id: BlockId) -> Self {
        Self {
            id,
            split: false,
            added: Vec::new(),
            retired: Vec::new(),
        }
    }

    pub fn split(id: BlockId) -> Self {
        Self {
            split: true,
            ..Self::join(id)
        }
    }

    /// Blocks that replaced the repeating one, once executed
    pub fn added(&self) -> Vec<BlockId> {
        self.added.iter().map(|b| b.id()).collect()
    }
}

impl UndoableCommand for RepeatsCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        if !self.added.is_empty() {
            let retired: Vec<BlockId> = self.retired.iter().map(|b| b.id()).collect();
            state.timeline.replace(&retired, self.added.clone())?;
            return Ok(());
        }

        let (ids, retired) = if self.split {
            let outcome = BlockJoiner::split_repeats(&mut state.timeline, self.id)?;
            (outcome.parts, vec![outcome.retired])
        } else {
            let outcome = BlockJoiner::join_repeats(&mut state.timeline, self.id)?;
            (vec![outcome.joined], outcome.retired)
        };
        self.added = ids
            .iter()
            .filter_map(|id| state.timeline.block(*id).cloned())
            .collect();
        self.retired = retired;
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        if self.retired.is_empty() {
            return Err(CommandError::UndoFailed("Repeats were never changed".into()));
        }
        let added = self.added();
        state.timeline.replace(&added, self.retired.clone())?;
        Ok(())
    }

    fn description(&self) -> String {
        if self.split {
            format!("Split repeats of block {}", self.id)
        } else {
            format!("Join repeats of block {}", self.id)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Join blocks of one lane into a single block
pub struct JoinBlocksCommand {
    ids: Vec<BlockId>,
    joined: Option<Block>,
    /// Inputs as they were before the join
    retired: Vec<Block>,
}

impl JoinBlocksCommand {
    pub fn new(ids: impl Into<Vec<BlockId>>) -> Self {
        Self {
            ids: ids.into(),
            joined: None,
            retired: Vec::new(),
        }
    }

    /// Id of the merged block once the command has run
    pub fn joined(&self) -> Option<BlockId> {
        self.joined.as_ref().map(|b| b.id())
    }
}

impl UndoableCommand for JoinBlocksCommand {
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
        // Redo swaps the recorded blocks back in
        if let Some(joined) = &self.joined {
            let retired: Vec<BlockId> = self.retired.iter().map(|b| b.id()).collect();
            state.timeline.replace(&retired, vec![joined.clone()])?;
            return Ok(());
        }

        let outcome = BlockJoiner::join(&mut state.timeline, &self.ids)?;
        let joined = state.timeline.block(outcome.joined).cloned().ok_or_else(|| {
            CommandError::InvalidState(format!("Joined block {} missing", outcome.joined))
        })?;
        self.joined = Some(joined);
        self.retired = outcome.retired;
        Ok(())
    }

    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
        let joined = self
            .joined
            .as_ref()
            .ok_or_else(|| CommandError::UndoFailed("Blocks were never joined".into()))?;
        // Inputs may have overlapped as join candidates
        state
            .timeline
            .restore_candidates(&[joined.id()], self.retired.clone())?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Join {} blocks", self.ids.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::manager::CommandManager;
    use crate::config::EngineConfig;
    use crate::sequencer::error::JoinError;
    use crate::sequencer::event::Event;

    fn state() -> EditorState {
        EditorState::new(&EngineConfig::default())
    }

    fn note(length: u64) -> EventList {
        let mut builder = EventList::builder();
        builder
            .push(Event::note_on(0u64, 60, 100))
            .push(Event::note_off(length, 60))
            .with_length(Tick(length));
        builder.finish().unwrap()
    }

    fn insert(manager: &mut CommandManager, state: &mut EditorState, lane: LaneId, start: u64) -> BlockId {
        let mut command = InsertBlockCommand::new(lane, Tick(start), note(100));
        command.execute(state).unwrap();
        let id = command.inserted().unwrap();
        manager.clear();
        id
    }

    #[test]
    fn test_insert_undo_redo_keeps_id() {
        let mut manager = CommandManager::new();
        let mut state = state();

        manager
            .execute(Box::new(InsertBlockCommand::new(0, Tick(0), note(100))), &mut state)
            .unwrap();
        let id = state.timeline.blocks().next().unwrap().id();

        manager.undo(&mut state).unwrap();
        assert_eq!(state.timeline.block_count(), 0);
        assert!(state.layout.bounds(&state.timeline, id).is_err());

        manager.redo(&mut state).unwrap();
        assert_eq!(state.timeline.block(id).unwrap().start(), Tick(0));
        assert!(state.layout.bounds(&state.timeline, id).is_ok());
    }

    #[test]
    fn test_overlapping_insert_is_not_recorded() {
        let mut manager = CommandManager::new();
        let mut state = state();
        insert(&mut manager, &mut state, 0, 0);

        let result = manager.execute(
            Box::new(InsertBlockCommand::new(0, Tick(50), note(100))),
            &mut state,
        );
        assert!(matches!(
            result,
            Err(CommandError::Placement(PlacementError::Overlap { .. }))
        ));
        assert!(!manager.can_undo());
        assert_eq!(state.timeline.block_count(), 1);
    }

    #[test]
    fn test_remove_then_undo_restores_block() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let id = insert(&mut manager, &mut state, 2, 480);

        manager
            .execute(Box::new(RemoveBlockCommand::new(id)), &mut state)
            .unwrap();
        assert!(state.timeline.block(id).is_none());

        manager.undo(&mut state).unwrap();
        let block = state.timeline.block(id).unwrap();
        assert_eq!((block.lane(), block.start()), (2, Tick(480)));
    }

    #[test]
    fn test_drag_merges_into_one_entry() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let id = insert(&mut manager, &mut state, 0, 0);

        for to in [10, 20, 30] {
            manager
                .execute(Box::new(MoveBlockCommand::new(id, Tick(to))), &mut state)
                .unwrap();
        }
        assert_eq!(manager.undo_count(), 1);
        assert_eq!(
            manager.undo_description().as_deref(),
            Some("Move block #1 to 30t")
        );

        manager.undo(&mut state).unwrap();
        assert_eq!(state.timeline.block(id).unwrap().start(), Tick(0));
        manager.redo(&mut state).unwrap();
        assert_eq!(state.timeline.block(id).unwrap().start(), Tick(30));
    }

    #[test]
    fn test_moves_of_different_blocks_stay_separate() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        let b = insert(&mut manager, &mut state, 1, 0);

        manager
            .execute(Box::new(MoveBlockCommand::new(a, Tick(200))), &mut state)
            .unwrap();
        manager
            .execute(Box::new(MoveBlockCommand::new(b, Tick(300))), &mut state)
            .unwrap();
        assert_eq!(manager.undo_count(), 2);
    }

    #[test]
    fn test_snapped_move_lands_on_neighbour() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        insert(&mut manager, &mut state, 1, 500);
        let window = EngineConfig::default().editing.snap_window();

        manager
            .execute(Box::new(MoveBlockCommand::snapped(a, Tick(490), window)), &mut state)
            .unwrap();
        assert_eq!(state.timeline.block(a).unwrap().start(), Tick(500));
        assert_eq!(
            manager.undo_description().as_deref(),
            Some("Move block #1 to 500t")
        );

        // Out of reach: taken as is
        let mut far = MoveBlockCommand::snapped(a, Tick(1000), window);
        far.execute(&mut state).unwrap();
        assert_eq!(far.target(), Tick(1000));

        // Undo returns to where the recorded move began
        manager.undo(&mut state).unwrap();
        assert_eq!(state.timeline.block(a).unwrap().start(), Tick(0));
    }

    #[test]
    fn test_length_drag_merges_and_undoes() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        let entries = manager.undo_count();

        for length in [200, 300] {
            manager
                .execute(
                    Box::new(SetBlockLengthCommand::new(a, Some(Tick(length)))),
                    &mut state,
                )
                .unwrap();
        }
        assert_eq!(manager.undo_count(), entries + 1);
        assert_eq!(state.timeline.block(a).unwrap().repetitions(), 3);

        manager.undo(&mut state).unwrap();
        let block = state.timeline.block(a).unwrap();
        assert_eq!((block.length(), block.end()), (None, Tick(100)));

        manager.redo(&mut state).unwrap();
        assert_eq!(state.timeline.block(a).unwrap().end(), Tick(300));
    }

    #[test]
    fn test_split_repeats_undo_redo() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        state.timeline.set_length(a, Some(Tick(250))).unwrap();

        manager
            .execute(Box::new(RepeatsCommand::split(a)), &mut state)
            .unwrap();
        let parts: Vec<BlockId> = state.timeline.lane_blocks(0).map(|b| b.id()).collect();
        assert_eq!(parts.len(), 3);
        assert!(state.timeline.block(a).is_none());

        manager.undo(&mut state).unwrap();
        assert_eq!(state.timeline.block_count(), 1);
        assert_eq!(state.timeline.block(a).unwrap().length(), Some(Tick(250)));

        manager.redo(&mut state).unwrap();
        let again: Vec<BlockId> = state.timeline.lane_blocks(0).map(|b| b.id()).collect();
        assert_eq!(again, parts);
        assert_eq!(
            manager.undo_description().as_deref(),
            Some("Split repeats of block #1")
        );
    }

    #[test]
    fn test_place_undo_unplaces_new_block() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let id = state.timeline.create_block(note(100));

        manager
            .execute(Box::new(PlaceBlockCommand::new(id, 3, Tick(960))), &mut state)
            .unwrap();
        assert_eq!(state.timeline.block(id).unwrap().lane(), 3);

        manager.undo(&mut state).unwrap();
        assert!(state.timeline.block(id).is_none());
        assert!(state.timeline.is_tracked(id));
    }

    #[test]
    fn test_place_undo_moves_back_across_lanes() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let id = insert(&mut manager, &mut state, 0, 100);

        manager
            .execute(Box::new(PlaceBlockCommand::new(id, 1, Tick(0))), &mut state)
            .unwrap();
        manager.undo(&mut state).unwrap();

        let block = state.timeline.block(id).unwrap();
        assert_eq!((block.lane(), block.start()), (0, Tick(100)));
    }

    #[test]
    fn test_join_undo_redo() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        let b = insert(&mut manager, &mut state, 0, 100);

        let command = JoinBlocksCommand::new(vec![a, b]);
        manager.execute(Box::new(command), &mut state).unwrap();
        let joined = state.timeline.blocks().next().unwrap().clone();
        assert_eq!(state.timeline.block_count(), 1);
        assert_eq!(joined.duration(), Tick(200));

        manager.undo(&mut state).unwrap();
        assert_eq!(state.timeline.block_count(), 2);
        assert!(state.timeline.block(a).is_some());
        assert!(state.timeline.block(joined.id()).is_none());

        manager.redo(&mut state).unwrap();
        assert_eq!(state.timeline.block(joined.id()), Some(&joined));
        assert!(state.timeline.block(b).is_none());
    }

    #[test]
    fn test_join_undo_restores_overlapping_candidates() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        let mut builder = EventList::builder();
        builder.push(Event::pressure(0u64, 40)).with_length(Tick(100));
        let b = state.timeline.insert(0, Tick(200), builder.finish().unwrap()).unwrap();
        state.timeline.mark_join_candidates(&[a, b]).unwrap();
        state.timeline.move_block(b, Tick(50)).unwrap();

        manager
            .execute(Box::new(JoinBlocksCommand::new(vec![a, b])), &mut state)
            .unwrap();
        manager.undo(&mut state).unwrap();

        assert_eq!(state.timeline.block(b).unwrap().start(), Tick(50));
        assert!(state.timeline.is_join_candidate(a));
    }

    #[test]
    fn test_failed_join_leaves_history_untouched() {
        let mut manager = CommandManager::new();
        let mut state = state();
        let a = insert(&mut manager, &mut state, 0, 0);
        let b = insert(&mut manager, &mut state, 0, 500);

        let result = manager.execute(Box::new(JoinBlocksCommand::new(vec![a, b])), &mut state);
        assert!(matches!(
            result,
            Err(CommandError::Join(JoinError::NonContiguousJoin { .. }))
        ));
        assert!(!manager.can_undo());
        assert_eq!(state.timeline.block_count(), 2);
    }
}
