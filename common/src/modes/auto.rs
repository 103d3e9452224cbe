use crate::command::AutoHeatUpdate;
use crate::furnace::OutputAction;
use crate::reading::SensorReading;
use crate::settings::HeatStageSettings;

use super::arbiter::ArbitrationPolicy;
use super::cool::CoolController;
use super::driven::Demand;
use super::staging::{Stage, StageMasks, Staging};

/// Cooling with a private heating side. Cooling is decided first; heating
/// only runs when cooling is not wanted, and never in the same reading.
#[derive(Debug, Clone)]
pub struct AutoController {
    pub(super) cool: CoolController,
    pub(super) heat: HeatStageSettings,
    heat_staging: Staging,
    target_cx10: i16,
}

impl AutoController {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self {
            cool: CoolController::new(policy),
            heat: HeatStageSettings::default(),
            heat_staging: Staging::default(),
            target_cx10: 0,
        }
    }

    pub fn cool(&self) -> &CoolController {
        &self.cool
    }

    pub fn heat_stage(&self) -> Stage {
        self.heat_staging.stage()
    }

    /// Cool target while cooling was last demanded, heat target while
    /// heating was.
    pub fn target_cx10(&self) -> i16 {
        self.target_cx10
    }

    pub fn is_idle(&self) -> bool {
        !self.cool.core.is_engaged() && !self.heat_staging.is_engaged()
    }

    pub fn initialize_state(&mut self, now_ms: u64) {
        self.cool.initialize_state(now_ms);
        self.heat_staging.restart(now_ms);
        self.target_cx10 = self.heat.target_cx10;
    }

    pub(super) fn set_heat(&mut self, heat: HeatStageSettings) {
        self.heat = heat;
        self.target_cx10 = heat.target_cx10;
    }

    pub fn on_reading(&mut self, reading: &SensorReading, now_ms: u64) -> Vec<OutputAction> {
        let temp_cx10 = reading.temp_cx10;
        let output = match self.cool.core.evaluate(temp_cx10, now_ms) {
            Some(mask) => {
                self.heat_staging.reset();
                self.target_cx10 = self.cool.core.thermal().target_cx10;
                mask
            }
            None => self
                .heat_output(temp_cx10, now_ms)
                .unwrap_or(self.cool.core.off_mask()),
        };

        let output = if self.heat_staging.is_engaged() {
            self.cool.dehumidifier.reset();
            output
        } else {
            self.cool.blend_humidity(reading, output)
        };
        vec![OutputAction::Update(self.cool.core.with_fan(output))]
    }

    fn heat_output(&mut self, temp_cx10: i16, now_ms: u64) -> Option<u8> {
        let wanted = Demand::Heat.wants(
            self.heat_staging.is_engaged(),
            temp_cx10,
            self.heat.target_cx10,
            self.heat.activate_cx10,
        );
        if !wanted {
            self.heat_staging.reset();
            return None;
        }

        self.target_cx10 = self.heat.target_cx10;
        let stage = self
            .heat_staging
            .demand(now_ms, &self.cool.core.stage_times());
        StageMasks::from(&self.heat).mask(stage)
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        if !self.heat_staging.is_engaged() {
            return self.cool.tick(now_ms);
        }

        if self.cool.core.sensor_timed_out(now_ms) {
            self.heat_staging.reset();
            return vec![OutputAction::Update(self.cool.core.off_mask())];
        }

        let masks = StageMasks::from(&self.heat);
        match self
            .heat_staging
            .advance(now_ms, &self.cool.core.stage_times())
            .and_then(|stage| masks.mask(stage))
        {
            Some(mask) => vec![OutputAction::Update(self.cool.core.with_fan(mask))],
            None => Vec::new(),
        }
    }

    pub fn apply_heat(&mut self, update: &AutoHeatUpdate) {
        let default_activate = Demand::Heat.default_activate(update.target_cx10);
        update.apply_to(&mut self.heat, default_activate);
    }

    pub(super) fn stop_heating(&mut self) {
        self.heat_staging.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DehumidifySettings, ThermalSettings};

    fn auto() -> AutoController {
        let mut controller = AutoController::new(ArbitrationPolicy::default());
        controller.cool.core.set_thermal(ThermalSettings {
            target_cx10: 240,
            activate_cx10: 246,
            sensor_mask: 1 << 1,
            always_on_mask: 0x01,
            stage1_mask: 0x20,
            stage2_mask: 0x22,
            stage3_mask: 0x26,
            seconds_to_stage2: 600,
            seconds_to_stage3: 1_200,
            ..ThermalSettings::default()
        });
        controller.cool.dehumidifier.settings = DehumidifySettings {
            on_mask: 0x10,
            off_mask: 0x00,
            target_x10: 500,
        };
        controller.set_heat(HeatStageSettings {
            target_cx10: 200,
            activate_cx10: 194,
            stage1_mask: 0x08,
            stage2_mask: 0x0A,
            stage3_mask: 0x0E,
        });
        controller.initialize_state(0);
        controller
    }

    fn reading(temp_cx10: i16, humidity_x10: Option<u16>) -> SensorReading {
        SensorReading {
            temp_cx10,
            humidity_x10,
        }
    }

    #[test]
    fn cold_reading_engages_heat_side() {
        let mut controller = auto();

        assert_eq!(
            controller.on_reading(&reading(190, None), 0),
            vec![OutputAction::Update(0x08)]
        );
        assert_eq!(controller.heat_stage(), Stage::Stage1);
        assert_eq!(controller.cool().core().stage(), Stage::Off);
        assert_eq!(controller.target_cx10(), 200);
    }

    #[test]
    fn hot_reading_engages_cool_side_and_drops_heat() {
        let mut controller = auto();
        controller.on_reading(&reading(190, None), 0);

        assert_eq!(
            controller.on_reading(&reading(250, None), 1_000),
            vec![OutputAction::Update(0x20)]
        );
        assert_eq!(controller.heat_stage(), Stage::Off);
        assert_eq!(controller.target_cx10(), 240);
    }

    #[test]
    fn dehumidify_only_while_heat_is_off() {
        let mut controller = auto();

        assert_eq!(
            controller.on_reading(&reading(190, Some(700)), 0),
            vec![OutputAction::Update(0x08)]
        );
        assert_eq!(
            controller.on_reading(&reading(245, Some(700)), 1_000),
            vec![OutputAction::Update(0x11)]
        );
    }

    #[test]
    fn comfortable_reading_keeps_previous_target() {
        let mut controller = auto();
        controller.on_reading(&reading(250, None), 0);

        assert_eq!(
            controller.on_reading(&reading(220, None), 1_000),
            vec![OutputAction::Update(0x01)]
        );
        assert_eq!(controller.target_cx10(), 240);
    }

    #[test]
    fn heat_side_escalates_on_cool_thresholds() {
        let mut controller = auto();
        controller.on_reading(&reading(190, None), 0);

        assert_eq!(controller.tick(600_000), vec![OutputAction::Update(0x0A)]);
        assert_eq!(controller.tick(1_200_000), vec![OutputAction::Update(0x0E)]);
    }

    #[test]
    fn heat_side_times_out() {
        let mut controller = auto();
        controller.on_reading(&reading(190, None), 0);

        assert_eq!(controller.tick(2_400_001), vec![OutputAction::Update(0x01)]);
        assert_eq!(controller.heat_stage(), Stage::Off);
    }
}
