// Command Pattern for Undo/Redo of arrangement edits
//
// Every Timeline edit the UI shell performs goes through UndoableCommand so
// it can be undone. After each execute/undo/redo the manager forwards the
// Timeline's change records to the layout engine.
//
// Architecture:
// - UndoableCommand trait: execute(), undo(), description(), merging
// - CommandManager: bounded undo/redo stacks
// - EditorState: Timeline + LayoutEngine owned by the editing thread
// - Concrete commands: insert, remove, move, place, join, length, repeats

pub mod commands;
pub mod manager;
pub mod state;
pub mod trait_def;

pub use commands::{
    InsertBlockCommand, JoinBlocksCommand, MoveBlockCommand, PlaceBlockCommand,
    RemoveBlockCommand, RepeatsCommand, SetBlockLengthCommand,
};
pub use manager::CommandManager;
pub use state::EditorState;
pub use trait_def::{CommandError, CommandResult, UndoableCommand};
