use crate::furnace::OutputAction;
use crate::settings::ModeName;
use crate::signals::INPUT_SIGNAL_MASK;

/// Thermostat lines drive the furnace lines one to one.
#[derive(Debug, Clone)]
pub struct PassThroughController {
    pub(super) name: ModeName,
}

impl Default for PassThroughController {
    fn default() -> Self {
        Self {
            name: ModeName::new("PASS"),
        }
    }
}

impl PassThroughController {
    pub fn on_inputs_changed(&self, inputs: u8) -> Vec<OutputAction> {
        vec![OutputAction::Update(inputs & INPUT_SIGNAL_MASK)]
    }
}
