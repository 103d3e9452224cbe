use packet_thermostat_common::{Eeprom, MemoryEeprom, StoreError};

/// EEPROM image kept in memory and mirrored to `eeprom.bin`. Writes mark it
/// dirty; the host flushes it after the command that caused them.
#[derive(Debug, Clone)]
pub struct FileEeprom {
    image: MemoryEeprom,
    dirty: bool,
}

impl FileEeprom {
    pub fn erased(capacity: usize) -> Self {
        Self {
            image: MemoryEeprom::new(capacity),
            dirty: false,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>, capacity: usize) -> Self {
        Self {
            image: MemoryEeprom::from_image(bytes, capacity),
            dirty: false,
        }
    }

    /// The full image if anything was written since the last call.
    pub fn take_dirty(&mut self) -> Option<Vec<u8>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.image.image().to_vec())
    }

    /// Puts back the flag after a flush that did not reach disk.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Eeprom for FileEeprom {
    fn capacity(&self) -> usize {
        self.image.capacity()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.image.read(addr, buf)
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.image.write(addr, bytes)?;
        self.dirty = true;
        Ok(())
    }
}
