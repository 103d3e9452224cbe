use crate::furnace::OutputAction;
use crate::reading::SensorReading;
use crate::settings::ModeName;

use super::arbiter::ArbitrationPolicy;
use super::driven::{Demand, SensorDriven};

#[derive(Debug, Clone)]
pub struct HeatController {
    pub(super) name: ModeName,
    pub(super) core: SensorDriven,
}

impl HeatController {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self {
            name: ModeName::default(),
            core: SensorDriven::new(Demand::Heat, policy),
        }
    }

    pub fn core(&self) -> &SensorDriven {
        &self.core
    }

    /// Humidity is not used when heating.
    pub fn on_reading(&mut self, reading: &SensorReading, now_ms: u64) -> Vec<OutputAction> {
        let output = self
            .core
            .evaluate(reading.temp_cx10, now_ms)
            .unwrap_or(self.core.off_mask());
        vec![OutputAction::Update(self.core.with_fan(output))]
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        self.core.tick(now_ms)
    }
}
