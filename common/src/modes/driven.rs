use tracing::warn;

use crate::command::ThermalUpdate;
use crate::error::CommandError;
use crate::furnace::OutputAction;
use crate::settings::{ThermalSettings, DEFAULT_ACTIVATE_OFFSET_CX10};

use super::arbiter::{ArbitrationPolicy, SensorArbiter, Verdict};
use super::staging::{Stage, StageMasks, StageTimes, Staging};

/// Direction of the activation predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    Heat,
    Cool,
}

impl Demand {
    pub fn default_activate(self, target_cx10: i16) -> i16 {
        match self {
            Self::Heat => target_cx10.saturating_sub(DEFAULT_ACTIVATE_OFFSET_CX10),
            Self::Cool => target_cx10.saturating_add(DEFAULT_ACTIVATE_OFFSET_CX10),
        }
    }

    /// Idle waits for the activate temperature; once engaged it runs until
    /// the target is reached.
    pub fn wants(self, engaged: bool, temp_cx10: i16, target_cx10: i16, activate_cx10: i16) -> bool {
        match (self, engaged) {
            (Self::Heat, false) => temp_cx10 <= activate_cx10,
            (Self::Heat, true) => temp_cx10 < target_cx10,
            (Self::Cool, false) => temp_cx10 >= activate_cx10,
            (Self::Cool, true) => temp_cx10 > target_cx10,
        }
    }
}

/// State shared by every mode that drives outputs from wireless sensors.
#[derive(Debug, Clone)]
pub struct SensorDriven {
    demand: Demand,
    thermal: ThermalSettings,
    staging: Staging,
    arbiter: SensorArbiter,
    fan_on: bool,
    last_actual_cx10: Option<i16>,
}

impl SensorDriven {
    pub fn new(demand: Demand, policy: ArbitrationPolicy) -> Self {
        Self {
            demand,
            thermal: ThermalSettings::default(),
            staging: Staging::default(),
            arbiter: SensorArbiter::new(policy),
            fan_on: false,
            last_actual_cx10: None,
        }
    }

    pub fn thermal(&self) -> &ThermalSettings {
        &self.thermal
    }

    pub fn set_thermal(&mut self, thermal: ThermalSettings) {
        self.thermal = thermal;
    }

    pub fn stage(&self) -> Stage {
        self.staging.stage()
    }

    pub fn is_engaged(&self) -> bool {
        self.staging.is_engaged()
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn last_actual(&self) -> Option<i16> {
        self.last_actual_cx10
    }

    pub fn stage_times(&self) -> StageTimes {
        StageTimes::from_thermal(&self.thermal)
    }

    pub fn initialize_state(&mut self, now_ms: u64) {
        self.staging.restart(now_ms);
        self.arbiter.reset(now_ms);
        self.fan_on = false;
        self.last_actual_cx10 = None;
    }

    pub fn off_mask(&self) -> u8 {
        self.thermal.always_on_mask
    }

    pub fn with_fan(&self, mask: u8) -> u8 {
        if self.fan_on {
            mask | self.thermal.fan_mask
        } else {
            mask
        }
    }

    /// `Ok(false)` when a higher-priority sensor holds the floor.
    pub fn accept(&mut self, sender_id: u8, now_ms: u64) -> Result<bool, CommandError> {
        match self.arbiter.offer(sender_id, self.thermal.sensor_mask, now_ms) {
            Verdict::Accepted => Ok(true),
            Verdict::Suppressed => Ok(false),
            Verdict::NotInMask => Err(CommandError::SensorNotAccepted(sender_id)),
        }
    }

    /// Runs the activation predicate and the staging machine for one
    /// reading. Returns the stage output, or `None` when no conditioning is
    /// wanted (staging is then OFF).
    pub fn evaluate(&mut self, temp_cx10: i16, now_ms: u64) -> Option<u8> {
        self.last_actual_cx10 = Some(temp_cx10);
        let wanted = self.demand.wants(
            self.staging.is_engaged(),
            temp_cx10,
            self.thermal.target_cx10,
            self.thermal.activate_cx10,
        );

        if wanted {
            let stage = self.staging.demand(now_ms, &self.stage_times());
            StageMasks::from(&self.thermal).mask(stage)
        } else {
            self.staging.reset();
            None
        }
    }

    pub fn apply_thermal(&mut self, update: &ThermalUpdate) -> Vec<OutputAction> {
        let default_activate = self.demand.default_activate(update.target_cx10);
        update.apply_to(&mut self.thermal, default_activate);
        self.staging.reset();
        vec![OutputAction::Update(self.with_fan(self.off_mask()))]
    }

    /// Fan off only clears the fan bits while nothing is staged.
    pub fn set_fan(&mut self, on: bool, idle: bool) -> Vec<OutputAction> {
        self.fan_on = on;
        if on {
            vec![OutputAction::Set(self.thermal.fan_mask)]
        } else if idle {
            vec![OutputAction::Clear(self.thermal.fan_mask)]
        } else {
            Vec::new()
        }
    }

    /// True when no accepted report has arrived for twice the stage 3
    /// delay. Forgets the last temperature so status shows it as unknown.
    pub fn sensor_timed_out(&mut self, now_ms: u64) -> bool {
        let silent_ms = self.arbiter.silent_for(now_ms);
        if silent_ms <= self.thermal.sensor_timeout_ms() {
            return false;
        }

        warn!(silent_ms, "sensor timed out, turning furnace off");
        self.last_actual_cx10 = None;
        true
    }

    /// Periodic staging for the primary side.
    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        if !self.staging.is_engaged() {
            return Vec::new();
        }
        if self.sensor_timed_out(now_ms) {
            self.staging.reset();
            return vec![OutputAction::Update(self.off_mask())];
        }

        let masks = StageMasks::from(&self.thermal);
        match self
            .staging
            .advance(now_ms, &self.stage_times())
            .and_then(|stage| masks.mask(stage))
        {
            Some(mask) => vec![OutputAction::Update(self.with_fan(mask))],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_predicate_has_hysteresis() {
        let heat = Demand::Heat;

        assert!(heat.wants(false, 364, 370, 364));
        assert!(!heat.wants(false, 365, 370, 364));
        assert!(heat.wants(true, 369, 370, 364));
        assert!(!heat.wants(true, 370, 370, 364));
    }

    #[test]
    fn cool_predicate_mirrors_heat() {
        let cool = Demand::Cool;

        assert!(cool.wants(false, 410, 400, 410));
        assert!(!cool.wants(false, 409, 400, 410));
        assert!(cool.wants(true, 401, 400, 410));
        assert!(!cool.wants(true, 400, 400, 410));
    }

    #[test]
    fn default_activate_is_six_tenths_away() {
        assert_eq!(Demand::Heat.default_activate(370), 364);
        assert_eq!(Demand::Cool.default_activate(400), 406);
    }

    #[test]
    fn fan_off_while_staged_leaves_outputs() {
        let mut core = SensorDriven::new(Demand::Heat, ArbitrationPolicy::default());
        core.set_thermal(ThermalSettings {
            fan_mask: 0x10,
            ..ThermalSettings::default()
        });

        assert_eq!(core.set_fan(true, true), vec![OutputAction::Set(0x10)]);
        assert!(core.set_fan(false, false).is_empty());
        assert_eq!(core.set_fan(false, true), vec![OutputAction::Clear(0x10)]);
    }
}
