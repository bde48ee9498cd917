// UndoableCommand trait definition

use crate::command::state::EditorState;
use crate::sequencer::error::{JoinError, PlacementError};
use std::any::Any;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Undo failed: {0}")]
    UndoFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Join(#[from] JoinError),
}

/// Trait for commands that support undo/redo
///
/// Commands run on the editing thread against [`EditorState`]. A failed
/// `execute` must leave the state as it found it; the Timeline API already
/// guarantees this for single calls.
///
/// # Example
/// ```no_run
/// use blockseq::command::{CommandResult, EditorState, UndoableCommand};
/// use blockseq::sequencer::{BlockId, Tick};
/// use std::any::Any;
///
/// struct NudgeCommand {
///     id: BlockId,
///     from: Option<Tick>,
/// }
///
/// impl UndoableCommand for NudgeCommand {
///     fn execute(&mut self, state: &mut EditorState) -> CommandResult<()> {
///         let start = state.timeline.block(self.id).map(|b| b.start()).unwrap_or_default();
///         self.from = Some(start);
///         state.timeline.move_block(self.id, start + Tick(10))?;
///         Ok(())
///     }
///
///     fn undo(&mut self, state: &mut EditorState) -> CommandResult<()> {
///         if let Some(from) = self.from {
///             state.timeline.move_block(self.id, from)?;
///         }
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         format!("Nudge block {}", self.id)
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn into_any(self: Box<Self>) -> Box<dyn Any> {
///         self
///     }
/// }
/// ```
pub trait UndoableCommand: Send + 'static {
    /// Execute the command, storing what undo needs
    fn execute(&mut self, state: &mut EditorState) -> CommandResult<()>;

    /// Restore the state to what it was before execute() was called
    fn undo(&mut self, state: &mut EditorState) -> CommandResult<()>;

    /// Human-readable description (e.g., "Undo: Move block #3")
    fn description(&self) -> String;

    /// For type checks in `can_merge_with`
    fn as_any(&self) -> &dyn Any;

    /// For downcasting in `merge_with`
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Whether an already executed `other` can fold into this history entry.
    /// Default implementation returns false.
    fn can_merge_with(&self, _other: &dyn UndoableCommand) -> bool {
        false
    }

    /// Fold `other` into this entry. Only called if can_merge_with() returned true.
    fn merge_with(&mut self, _other: Box<dyn UndoableCommand>) -> CommandResult<()> {
        Ok(())
    }
}
