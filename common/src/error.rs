use thiserror::Error;

use crate::layout::ModeType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{len} bytes at {addr:#06x} exceed store capacity of {capacity} bytes")]
    OutOfRange {
        addr: usize,
        len: usize,
        capacity: usize,
    },
    #[error("{mode_type} slot {slot} is not addressable with {count} configured slots")]
    SlotUnavailable {
        mode_type: ModeType,
        slot: u8,
        count: u8,
    },
    #[error("PASSTHROUGH always has exactly one slot")]
    FixedSlotCount,
}

/// Why an inbound packet was not acted on. None of these leave persisted
/// state half-changed, except where noted on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command not recognized")]
    NotRecognized,
    #[error("hvac type {0} out of range")]
    TypeOutOfRange(i32),
    #[error("slot count {0} out of range")]
    CountOutOfRange(i32),
    #[error("{mode_type} slot {slot} out of range ({count} configured)")]
    SlotOutOfRange {
        mode_type: ModeType,
        slot: i32,
        count: u8,
    },
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("{command} does not apply to {mode_type} mode")]
    Unsupported {
        command: &'static str,
        mode_type: ModeType,
    },
    /// Table entries before `index` from the same command remain written.
    #[error("map index {0} is past the end of the table")]
    MapIndexOutOfRange(u32),
    #[error("sensor {0} is not in this mode's sensor mask")]
    SensorNotAccepted(u8),
    #[error("sensor report carries no temperature")]
    MalformedReading,
    #[error(transparent)]
    Store(#[from] StoreError),
}
