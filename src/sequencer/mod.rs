// Sequencer module
// Time base, events, blocks and the timeline that arranges them

pub mod block;
pub mod error;
pub mod event;
pub mod joiner;
pub mod markers;
pub mod time;
pub mod timeline;

pub use block::{Block, BlockId, LaneId};
pub use error::{DataIntegrityError, JoinError, PlacementError};
pub use event::{Event, EventKind, EventList, EventListBuilder};
pub use joiner::{BlockJoiner, JoinOutcome, SplitOutcome};
pub use markers::MarkerList;
pub use time::{Tempo, Tick, TimeRange};
pub use timeline::{Timeline, TimelineChange, TimelineReader, TimelineSnapshot};
