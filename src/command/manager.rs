// CommandManager - Manages undo/redo stacks

use crate::command::state::EditorState;
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::config::HistoryConfig;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

/// Default maximum number of commands to keep in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Manages command execution and undo/redo functionality
///
/// The CommandManager maintains two stacks:
/// - Undo stack: Commands that have been executed and can be undone
/// - Redo stack: Commands that have been undone and can be redone
///
/// When a new command is executed:
/// 1. Execute the command and forward the Timeline changes to layout
/// 2. Merge it into the last entry when that entry accepts it, else push it
/// 3. Clear the redo stack (since we're on a new timeline)
///
/// # Memory Management
/// The undo stack is bounded; when the limit is reached the oldest command
/// is dropped.
pub struct CommandManager {
    /// Stack of commands that can be undone (most recent at the back)
    undo_stack: VecDeque<Box<dyn UndoableCommand>>,

    /// Stack of commands that can be redone (most recent at the back)
    redo_stack: VecDeque<Box<dyn UndoableCommand>>,

    /// Maximum number of commands to keep in history
    max_history: usize,
}

impl CommandManager {
    /// Create a new CommandManager with default settings
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::with_capacity(config.max_undo)
    }

    /// Create a new CommandManager with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Execute a command and add it to the undo stack
    ///
    /// # Errors
    /// Returns an error if the command execution fails. Nothing is recorded
    /// in that case.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        state: &mut EditorState,
    ) -> CommandResult<()> {
        command.execute(state)?;
        state.commit(Instant::now());
        debug!(command = %command.description(), "command executed");

        let merge = self
            .undo_stack
            .back()
            .is_some_and(|last| last.can_merge_with(command.as_ref()));
        if merge {
            if let Some(last) = self.undo_stack.back_mut() {
                last.merge_with(command)?;
            }
        } else {
            self.undo_stack.push_back(command);
        }

        // New branch of history
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }

        Ok(())
    }

    /// Undo the last command
    ///
    /// # Errors
    /// Returns an error if there is nothing to undo or the undo fails. A
    /// command whose undo fails is dropped from history.
    pub fn undo(&mut self, state: &mut EditorState) -> CommandResult<String> {
        let mut command = self
            .undo_stack
            .pop_back()
            .ok_or_else(|| CommandError::UndoFailed("Nothing to undo".into()))?;

        let description = command.description();
        command.undo(state)?;
        state.commit(Instant::now());

        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Redo the last undone command
    ///
    /// # Errors
    /// Returns an error if there is nothing to redo or the execution fails.
    pub fn redo(&mut self, state: &mut EditorState) -> CommandResult<String> {
        let mut command = self
            .redo_stack
            .pop_back()
            .ok_or_else(|| CommandError::ExecutionFailed("Nothing to redo".into()))?;

        let description = command.description();
        command.execute(state)?;
        state.commit(Instant::now());

        self.undo_stack.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the command that would be undone
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|cmd| cmd.description())
    }

    /// Description of the command that would be redone
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|cmd| cmd.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::any::Any;

    // Mock command for testing
    struct MockCommand {
        value: i32,
        old_value: Option<i32>,
        executed: bool,
        mergeable: bool,
    }

    impl MockCommand {
        fn new(value: i32) -> Self {
            Self {
                value,
                old_value: None,
                executed: false,
                mergeable: false,
            }
        }

        fn mergeable(value: i32) -> Self {
            Self {
                mergeable: true,
                ..Self::new(value)
            }
        }
    }

    impl UndoableCommand for MockCommand {
        fn execute(&mut self, _state: &mut EditorState) -> CommandResult<()> {
            self.old_value = Some(0);
            self.executed = true;
            Ok(())
        }

        fn undo(&mut self, _state: &mut EditorState) -> CommandResult<()> {
            if self.old_value.is_none() {
                return Err(CommandError::UndoFailed("Not executed".into()));
            }
            self.executed = false;
            Ok(())
        }

        fn description(&self) -> String {
            format!("Set value to {}", self.value)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }

        fn can_merge_with(&self, other: &dyn UndoableCommand) -> bool {
            self.mergeable
                && other
                    .as_any()
                    .downcast_ref::<MockCommand>()
                    .is_some_and(|o| o.mergeable)
        }

        fn merge_with(&mut self, other: Box<dyn UndoableCommand>) -> CommandResult<()> {
            let other = other
                .into_any()
                .downcast::<MockCommand>()
                .map_err(|_| CommandError::InvalidState("not a MockCommand".into()))?;
            self.value = other.value;
            Ok(())
        }
    }

    struct FailingCommand;

    impl UndoableCommand for FailingCommand {
        fn execute(&mut self, _state: &mut EditorState) -> CommandResult<()> {
            Err(CommandError::ExecutionFailed("always fails".into()))
        }

        fn undo(&mut self, _state: &mut EditorState) -> CommandResult<()> {
            Ok(())
        }

        fn description(&self) -> String {
            "Fail".into()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    fn create_test_state() -> EditorState {
        EditorState::new(&EngineConfig::default())
    }

    #[test]
    fn test_execute_command() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        manager
            .execute(Box::new(MockCommand::new(42)), &mut state)
            .unwrap();

        assert_eq!(manager.undo_count(), 1);
        assert_eq!(manager.redo_count(), 0);
        assert!(manager.can_undo());
        assert!(!manager.can_redo());
    }

    #[test]
    fn test_undo() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        manager
            .execute(Box::new(MockCommand::new(42)), &mut state)
            .unwrap();

        let description = manager.undo(&mut state).unwrap();
        assert_eq!(description, "Set value to 42");
        assert_eq!(manager.undo_count(), 0);
        assert_eq!(manager.redo_count(), 1);
    }

    #[test]
    fn test_redo() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        manager
            .execute(Box::new(MockCommand::new(42)), &mut state)
            .unwrap();
        manager.undo(&mut state).unwrap();

        let description = manager.redo(&mut state).unwrap();
        assert_eq!(description, "Set value to 42");
        assert_eq!(manager.undo_count(), 1);
        assert_eq!(manager.redo_count(), 0);
    }

    #[test]
    fn test_redo_stack_cleared_on_new_command() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        manager
            .execute(Box::new(MockCommand::new(1)), &mut state)
            .unwrap();
        manager.undo(&mut state).unwrap();
        manager
            .execute(Box::new(MockCommand::new(2)), &mut state)
            .unwrap();

        assert!(!manager.can_redo());
        assert_eq!(manager.redo_count(), 0);
    }

    #[test]
    fn test_history_limit() {
        let mut manager = CommandManager::with_capacity(3);
        let mut state = create_test_state();

        for i in 0..5 {
            manager
                .execute(Box::new(MockCommand::new(i)), &mut state)
                .unwrap();
        }

        assert_eq!(manager.undo_count(), 3);
        assert_eq!(manager.undo_description().as_deref(), Some("Set value to 4"));
    }

    #[test]
    fn test_mergeable_commands_share_one_entry() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        for i in 0..3 {
            manager
                .execute(Box::new(MockCommand::mergeable(i)), &mut state)
                .unwrap();
        }
        manager
            .execute(Box::new(MockCommand::new(9)), &mut state)
            .unwrap();

        assert_eq!(manager.undo_count(), 2);
        manager.undo(&mut state).unwrap();
        assert_eq!(manager.undo_description().as_deref(), Some("Set value to 2"));
    }

    #[test]
    fn test_failed_command_not_recorded() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        let result = manager.execute(Box::new(FailingCommand), &mut state);
        assert!(matches!(result, Err(CommandError::ExecutionFailed(_))));
        assert!(!manager.can_undo());
    }

    #[test]
    fn test_undo_with_empty_stack() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        assert!(manager.undo(&mut state).is_err());
    }

    #[test]
    fn test_redo_with_empty_stack() {
        let mut manager = CommandManager::new();
        let mut state = create_test_state();

        assert!(manager.redo(&mut state).is_err());
    }
}
