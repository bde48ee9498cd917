// Error types for the arrangement model

use crate::sequencer::block::{BlockId, LaneId};
use crate::sequencer::time::{Tick, TimeRange};

/// Rejected Timeline placement. The Timeline is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("block {block} would overlap block {conflicting} in lane {lane}")]
    Overlap {
        block: BlockId,
        conflicting: BlockId,
        lane: LaneId,
    },

    #[error("unknown block: {0}")]
    UnknownBlock(BlockId),

    #[error("block id already in use: {0}")]
    DuplicateBlock(BlockId),

    #[error("block {0} is not placed on a lane")]
    Unplaced(BlockId),

    #[error("block {0} cannot be given a zero length")]
    ZeroLength(BlockId),
}

/// Rejected join. The Timeline is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("join needs at least two blocks, got {0}")]
    NotEnoughBlocks(usize),

    #[error("blocks span lanes {first} and {other}")]
    CrossLaneJoin { first: LaneId, other: LaneId },

    #[error("blocks leave a gap at {gap}")]
    NonContiguousJoin { gap: TimeRange },

    #[error("block {0} does not repeat")]
    NotRepeating(BlockId),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("joined events are malformed: {0}")]
    Integrity(#[from] DataIntegrityError),
}

/// Malformed EventList content
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataIntegrityError {
    #[error("note {pitch} switched on again at {at} without a note off")]
    DoubleNoteOn { pitch: u8, at: Tick },

    #[error("note off for {pitch} at {at} has no matching note on")]
    UnmatchedNoteOff { pitch: u8, at: Tick },

    #[error("pitch {pitch} at {at} is outside 0-127")]
    PitchOutOfRange { pitch: u8, at: Tick },

    #[error("velocity {velocity} at {at} is outside 0-127")]
    VelocityOutOfRange { velocity: u8, at: Tick },

    #[error("bend {value} at {at} is outside -8192..=8191")]
    BendOutOfRange { value: i16, at: Tick },
}
