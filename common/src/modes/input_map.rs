use tracing::debug;

use crate::error::CommandError;
use crate::furnace::OutputAction;
use crate::settings::{MapTable, ModeName, MAP_PASS_THROUGH};
use crate::signals::{map_index, INPUT_SIGNAL_MASK, NUM_INPUT_COMBINATIONS};

/// Table lookup from the 64 input combinations to an output byte.
#[derive(Debug, Clone)]
pub struct InputMapController {
    pub(super) name: ModeName,
    pub(super) table: MapTable,
}

impl Default for InputMapController {
    fn default() -> Self {
        Self {
            name: ModeName::default(),
            table: [MAP_PASS_THROUGH; NUM_INPUT_COMBINATIONS],
        }
    }
}

impl InputMapController {
    pub fn table(&self) -> &MapTable {
        &self.table
    }

    pub fn on_inputs_changed(&self, inputs: u8) -> Vec<OutputAction> {
        let inputs = inputs & INPUT_SIGNAL_MASK;
        let output = match self.table[map_index(inputs)] {
            MAP_PASS_THROUGH => inputs,
            mapped => mapped,
        };
        vec![OutputAction::Update(output)]
    }

    /// Writes `values` into consecutive entries. Entries written before an
    /// out-of-range index stay written.
    pub fn write(&mut self, start: u32, values: &[u8]) -> Result<(), CommandError> {
        let mut index = start;
        for value in values {
            let entry = usize::try_from(index)
                .ok()
                .and_then(|at| self.table.get_mut(at))
                .ok_or(CommandError::MapIndexOutOfRange(index))?;
            *entry = *value;
            debug!(index, value = format_args!("{value:#04x}"), "map entry");
            index = index.saturating_add(1);
        }
        Ok(())
    }
}
