// blockseq - Library exports for the binary, tests and benchmarks

pub mod command;
pub mod config;
pub mod connection;
pub mod layout;
pub mod messaging;
pub mod sequencer;
pub mod transport;

// Re-export commonly used types for convenience
pub use command::{CommandManager, EditorState, UndoableCommand};
pub use config::{ConfigError, EngineConfig};
pub use layout::{LayoutEngine, Rect, ViewTransform};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use sequencer::{
    Block, BlockId, BlockJoiner, Event, EventKind, EventList, LaneId, Tempo, Tick, TimeRange,
    Timeline, TimelineReader,
};
pub use transport::{
    ClockControl, ClockEvent, SamplerSink, TransportController, TransportSync, create_session,
};
