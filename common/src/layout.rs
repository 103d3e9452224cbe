use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signals::NUM_INPUT_COMBINATIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeType {
    #[serde(rename = "PASSTHROUGH")]
    PassThrough,
    InputMap,
    Heat,
    Cool,
    Auto,
}

/// A run of bytes a mode type contributes to its settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Name,
    Table,
    Thermal,
    Dehumidify,
    HeatStage,
}

impl Block {
    pub const fn size(self) -> usize {
        match self {
            // five characters plus terminator
            Self::Name => 6,
            Self::Table => NUM_INPUT_COMBINATIONS,
            Self::Thermal => 17,
            Self::Dehumidify => 4,
            Self::HeatStage => 7,
        }
    }
}

impl ModeType {
    pub const ALL: [ModeType; 5] = [
        Self::PassThrough,
        Self::InputMap,
        Self::Heat,
        Self::Cool,
        Self::Auto,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::PassThrough => 0,
            Self::InputMap => 1,
            Self::Heat => 2,
            Self::Cool => 3,
            Self::Auto => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PassThrough => "PASSTHROUGH",
            Self::InputMap => "INPUT_MAP",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
        }
    }

    pub fn blocks(self) -> &'static [Block] {
        match self {
            Self::PassThrough => &[Block::Name],
            Self::InputMap => &[Block::Name, Block::Table],
            Self::Heat => &[Block::Name, Block::Thermal],
            Self::Cool => &[Block::Name, Block::Thermal, Block::Dehumidify],
            Self::Auto => &[
                Block::Name,
                Block::Thermal,
                Block::Dehumidify,
                Block::HeatStage,
            ],
        }
    }

    pub fn record_size(self) -> usize {
        self.blocks().iter().map(|block| block.size()).sum()
    }

    pub fn is_sensor_driven(self) -> bool {
        matches!(self, Self::Heat | Self::Cool | Self::Auto)
    }
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ACTIVE_MODE_BYTES: usize = 2;
pub const COUNT_TABLE_BYTES: usize = ModeType::ALL.len() - 1;
pub const ERASED_BYTE: u8 = 0xFF;

/// Configured slots per mode type. PassThrough is pinned at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotCounts([u8; COUNT_TABLE_BYTES]);

impl SlotCounts {
    pub fn from_raw(raw: [u8; COUNT_TABLE_BYTES]) -> Self {
        Self(raw.map(|count| if count == ERASED_BYTE { 0 } else { count }))
    }

    pub fn get(&self, mode_type: ModeType) -> u8 {
        match mode_type.index().checked_sub(1) {
            Some(slot) => self.0[slot],
            None => 1,
        }
    }

    pub fn set(&mut self, mode_type: ModeType, count: u8) -> bool {
        match mode_type.index().checked_sub(1) {
            Some(slot) => {
                self.0[slot] = count;
                true
            }
            None => false,
        }
    }

    /// Whether any type after `mode_type` has slots that a count change
    /// would shift.
    pub fn later_types_configured(&self, mode_type: ModeType) -> bool {
        ModeType::ALL
            .iter()
            .filter(|later| **later > mode_type)
            .any(|later| self.get(*later) > 0)
    }
}

/// Where the settings subsystem lives inside the nonvolatile store:
/// active-mode selector, then the count table, then every record in type
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    base: u16,
}

impl RecordLayout {
    pub fn new(base: u16) -> Self {
        Self { base }
    }

    pub fn active_mode_address(&self) -> usize {
        usize::from(self.base)
    }

    pub fn count_table_address(&self) -> usize {
        self.active_mode_address() + ACTIVE_MODE_BYTES
    }

    pub fn count_address(&self, mode_type: ModeType) -> Option<usize> {
        let offset = mode_type.index().checked_sub(1)?;
        Some(self.count_table_address() + offset)
    }

    pub fn records_start(&self) -> usize {
        self.count_table_address() + COUNT_TABLE_BYTES
    }

    /// Byte offset of slot `index` of `mode_type`. One past the last
    /// configured slot is addressable so a slot can be written before its
    /// count is raised.
    pub fn slot_address(&self, counts: &SlotCounts, mode_type: ModeType, index: u8) -> Option<usize> {
        if index > counts.get(mode_type) {
            return None;
        }

        let start = match mode_type.previous() {
            None => self.records_start(),
            Some(previous) => self.slot_address(counts, previous, counts.get(previous))?,
        };
        Some(start + usize::from(index) * mode_type.record_size())
    }

    /// First byte past every configured record.
    pub fn end_of_records(&self, counts: &SlotCounts) -> usize {
        let last = ModeType::Auto;
        self.slot_address(counts, last, counts.get(last))
            .unwrap_or_else(|| self.records_start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(input_map: u8, heat: u8, cool: u8, auto: u8) -> SlotCounts {
        SlotCounts::from_raw([input_map, heat, cool, auto])
    }

    #[test]
    fn record_sizes_follow_block_table() {
        assert_eq!(ModeType::PassThrough.record_size(), 6);
        assert_eq!(ModeType::InputMap.record_size(), 70);
        assert_eq!(ModeType::Heat.record_size(), 23);
        assert_eq!(ModeType::Cool.record_size(), 27);
        assert_eq!(ModeType::Auto.record_size(), 34);
    }

    #[test]
    fn erased_counts_read_as_zero() {
        let counts = SlotCounts::from_raw([0xFF; COUNT_TABLE_BYTES]);

        assert_eq!(counts.get(ModeType::PassThrough), 1);
        for mode_type in &ModeType::ALL[1..] {
            assert_eq!(counts.get(*mode_type), 0);
        }
    }

    #[test]
    fn passthrough_count_cannot_be_set() {
        let mut counts = SlotCounts::default();

        assert!(!counts.set(ModeType::PassThrough, 4));
        assert_eq!(counts.get(ModeType::PassThrough), 1);
    }

    #[test]
    fn each_type_starts_where_previous_ends() {
        let layout = RecordLayout::new(32);
        let counts = counts(1, 2, 1, 3);

        assert_eq!(layout.slot_address(&counts, ModeType::PassThrough, 0), Some(38));
        for mode_type in &ModeType::ALL[1..] {
            let previous = mode_type.previous().unwrap();
            assert_eq!(
                layout.slot_address(&counts, *mode_type, 0),
                layout.slot_address(&counts, previous, counts.get(previous)),
            );
        }

        assert_eq!(layout.slot_address(&counts, ModeType::InputMap, 0), Some(44));
        assert_eq!(layout.slot_address(&counts, ModeType::Heat, 0), Some(114));
        assert_eq!(layout.slot_address(&counts, ModeType::Heat, 1), Some(137));
        assert_eq!(layout.slot_address(&counts, ModeType::Cool, 0), Some(160));
        assert_eq!(layout.slot_address(&counts, ModeType::Auto, 0), Some(187));
        assert_eq!(layout.end_of_records(&counts), 187 + 3 * 34);
    }

    #[test]
    fn one_past_last_slot_is_addressable() {
        let layout = RecordLayout::new(0);
        let counts = counts(0, 2, 0, 0);

        assert!(layout.slot_address(&counts, ModeType::Heat, 2).is_some());
        assert_eq!(layout.slot_address(&counts, ModeType::Heat, 3), None);
        assert_eq!(layout.slot_address(&counts, ModeType::PassThrough, 2), None);
    }

    #[test]
    fn raising_a_count_shifts_only_later_types() {
        let layout = RecordLayout::new(0);
        let before = counts(1, 1, 1, 1);
        let after = counts(1, 2, 1, 1);

        assert_eq!(
            layout.slot_address(&before, ModeType::Heat, 0),
            layout.slot_address(&after, ModeType::Heat, 0)
        );
        assert_ne!(
            layout.slot_address(&before, ModeType::Cool, 0),
            layout.slot_address(&after, ModeType::Cool, 0)
        );
        assert!(after.later_types_configured(ModeType::Heat));
        assert!(!after.later_types_configured(ModeType::Auto));
    }
}
