use tracing::{debug, warn};

use crate::error::StoreError;
use crate::layout::{
    ModeType, RecordLayout, SlotCounts, ACTIVE_MODE_BYTES, COUNT_TABLE_BYTES, ERASED_BYTE,
};
use crate::settings::SettingsRecord;

/// Byte-addressable nonvolatile memory. Erased cells read as 0xFF.
pub trait Eeprom {
    fn capacity(&self) -> usize;
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError>;
    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError>;

    fn read_byte(&self, addr: usize) -> Result<u8, StoreError> {
        let mut byte = [0u8; 1];
        self.read(addr, &mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StoreError> {
        self.write(addr, &[value])
    }
}

pub fn check_range(addr: usize, len: usize, capacity: usize) -> Result<(), StoreError> {
    match addr.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StoreError::OutOfRange {
            addr,
            len,
            capacity,
        }),
    }
}

/// EEPROM image held in RAM, starting fully erased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEeprom {
    bytes: Vec<u8>,
}

impl MemoryEeprom {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![ERASED_BYTE; capacity],
        }
    }

    /// Wraps an existing image, padding or truncating it to `capacity`.
    pub fn from_image(mut bytes: Vec<u8>, capacity: usize) -> Self {
        bytes.resize(capacity, ERASED_BYTE);
        Self { bytes }
    }

    pub fn image(&self) -> &[u8] {
        &self.bytes
    }
}

impl Eeprom for MemoryEeprom {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_range(addr, buf.len(), self.capacity())?;
        buf.copy_from_slice(&self.bytes[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_range(addr, bytes.len(), self.capacity())?;
        self.bytes[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Settings records, slot counts and the active-mode selector, laid out in
/// one nonvolatile store.
#[derive(Debug, Clone)]
pub struct SettingsStore<E> {
    eeprom: E,
    layout: RecordLayout,
}

impl<E: Eeprom> SettingsStore<E> {
    pub fn new(eeprom: E, layout: RecordLayout) -> Self {
        Self { eeprom, layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut E {
        &mut self.eeprom
    }

    pub fn into_inner(self) -> E {
        self.eeprom
    }

    pub fn slot_counts(&self) -> Result<SlotCounts, StoreError> {
        let mut raw = [0u8; COUNT_TABLE_BYTES];
        self.eeprom.read(self.layout.count_table_address(), &mut raw)?;
        Ok(SlotCounts::from_raw(raw))
    }

    pub fn slot_count(&self, mode_type: ModeType) -> Result<u8, StoreError> {
        Ok(self.slot_counts()?.get(mode_type))
    }

    /// Changing a count moves every record of every later type. Records
    /// already committed there are not relocated.
    pub fn set_slot_count(&mut self, mode_type: ModeType, count: u8) -> Result<(), StoreError> {
        let addr = self
            .layout
            .count_address(mode_type)
            .ok_or(StoreError::FixedSlotCount)?;

        let counts = self.slot_counts()?;
        if counts.get(mode_type) != count && counts.later_types_configured(mode_type) {
            warn!(
                "slot count change for {mode_type} shifts records of later types; \
                 reconfigure and recommit them"
            );
        }

        self.eeprom.write_byte(addr, count)?;
        debug!(%mode_type, count, "slot count set");
        Ok(())
    }

    pub fn slot_address(&self, mode_type: ModeType, slot: u8) -> Result<usize, StoreError> {
        let counts = self.slot_counts()?;
        self.layout
            .slot_address(&counts, mode_type, slot)
            .ok_or(StoreError::SlotUnavailable {
                mode_type,
                slot,
                count: counts.get(mode_type),
            })
    }

    /// `Ok(None)` when the record has never been written.
    pub fn load(
        &self,
        mode_type: ModeType,
        slot: u8,
    ) -> Result<Option<SettingsRecord>, StoreError> {
        let addr = self.slot_address(mode_type, slot)?;
        let mut bytes = vec![0u8; mode_type.record_size()];
        self.eeprom.read(addr, &mut bytes)?;

        if bytes.iter().all(|byte| *byte == ERASED_BYTE) {
            debug!(%mode_type, slot, addr, "record erased, keeping defaults");
            return Ok(None);
        }
        Ok(SettingsRecord::decode(mode_type, &bytes))
    }

    /// Writes the record verbatim and returns its address.
    pub fn save(&mut self, slot: u8, record: &SettingsRecord) -> Result<usize, StoreError> {
        let mode_type = record.mode_type();
        let addr = self.slot_address(mode_type, slot)?;
        let bytes = record.encode();
        self.eeprom.write(addr, &bytes)?;

        debug!(
            %mode_type,
            slot,
            addr,
            remaining = self.eeprom.capacity().saturating_sub(addr + bytes.len()),
            "record saved"
        );
        Ok(addr)
    }

    /// The persisted (type, slot) selector, if it names a configured slot.
    pub fn active_mode(&self) -> Result<Option<(ModeType, u8)>, StoreError> {
        let mut raw = [0u8; ACTIVE_MODE_BYTES];
        self.eeprom.read(self.layout.active_mode_address(), &mut raw)?;
        let [mode_type, slot] = raw;

        let Some(mode_type) = ModeType::from_index(usize::from(mode_type)) else {
            return Ok(None);
        };
        if slot >= self.slot_count(mode_type)? {
            return Ok(None);
        }
        Ok(Some((mode_type, slot)))
    }

    pub fn set_active_mode(&mut self, mode_type: ModeType, slot: u8) -> Result<(), StoreError> {
        let raw = [mode_type.index() as u8, slot];
        self.eeprom.write(self.layout.active_mode_address(), &raw)
    }
}
