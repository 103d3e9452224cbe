use serde::Serialize;

use crate::furnace::OutputAction;
use crate::reading::SensorReading;
use crate::settings::{DehumidifySettings, ModeName};

use super::arbiter::ArbitrationPolicy;
use super::driven::{Demand, SensorDriven};

/// 1.5% RH either side of the target.
pub const DEHUMIDIFY_HYSTERESIS_X10: i32 = 15;

/// Dehumidifying is abandoned once it has cooled the room this far below
/// the cooling activate temperature.
pub const DEHUMIDIFY_ABORT_CX10: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DehumidifyState {
    #[default]
    Off,
    Active,
}

impl DehumidifyState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Active => "ACTIVE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dehumidifier {
    pub(super) settings: DehumidifySettings,
    state: DehumidifyState,
}

impl Dehumidifier {
    pub fn settings(&self) -> &DehumidifySettings {
        &self.settings
    }

    pub fn state(&self) -> DehumidifyState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = DehumidifyState::Off;
    }

    pub fn blend(
        &mut self,
        humidity_x10: u16,
        temp_cx10: i16,
        cool_activate_cx10: i16,
        mask: u8,
    ) -> u8 {
        if !self.settings.is_enabled() {
            self.state = DehumidifyState::Off;
            return mask;
        }

        let target = i32::from(self.settings.target_x10);
        let threshold = match self.state {
            DehumidifyState::Off => target + DEHUMIDIFY_HYSTERESIS_X10,
            DehumidifyState::Active => target - DEHUMIDIFY_HYSTERESIS_X10,
        };
        let needed = i32::from(humidity_x10) > threshold;
        let too_cold = i32::from(temp_cx10) < i32::from(cool_activate_cx10) - DEHUMIDIFY_ABORT_CX10;

        self.state = if needed && !too_cold {
            DehumidifyState::Active
        } else {
            DehumidifyState::Off
        };
        self.hold(mask)
    }

    /// Applies the on/off masks while active.
    pub fn hold(&self, mask: u8) -> u8 {
        match self.state {
            DehumidifyState::Active => (mask | self.settings.on_mask) & !self.settings.off_mask,
            DehumidifyState::Off => mask,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoolController {
    pub(super) name: ModeName,
    pub(super) core: SensorDriven,
    pub(super) dehumidifier: Dehumidifier,
}

impl CoolController {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self {
            name: ModeName::default(),
            core: SensorDriven::new(Demand::Cool, policy),
            dehumidifier: Dehumidifier::default(),
        }
    }

    pub fn core(&self) -> &SensorDriven {
        &self.core
    }

    pub fn dehumidifier(&self) -> &Dehumidifier {
        &self.dehumidifier
    }

    pub fn initialize_state(&mut self, now_ms: u64) {
        self.core.initialize_state(now_ms);
        self.dehumidifier.reset();
    }

    pub fn on_reading(&mut self, reading: &SensorReading, now_ms: u64) -> Vec<OutputAction> {
        let output = self
            .core
            .evaluate(reading.temp_cx10, now_ms)
            .unwrap_or(self.core.off_mask());
        let output = self.blend_humidity(reading, output);
        vec![OutputAction::Update(self.core.with_fan(output))]
    }

    /// Reports without humidity leave the output and the dehumidify state
    /// alone.
    pub(super) fn blend_humidity(&mut self, reading: &SensorReading, mask: u8) -> u8 {
        match reading.humidity_x10 {
            Some(humidity_x10) => self.dehumidifier.blend(
                humidity_x10,
                reading.temp_cx10,
                self.core.thermal().activate_cx10,
                mask,
            ),
            None => mask,
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        let was_engaged = self.core.is_engaged();
        let actions = self.core.tick(now_ms);

        // only a sensor timeout disengages staging from the tick
        if was_engaged && !self.core.is_engaged() {
            self.dehumidifier.reset();
        }
        actions
    }
}
