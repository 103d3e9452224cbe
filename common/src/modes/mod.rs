//! The five operating modes and the runtime state each one owns.

pub mod arbiter;
pub mod auto;
pub mod cool;
pub mod driven;
pub mod heat;
pub mod input_map;
pub mod passthrough;
pub mod staging;

use tracing::debug;

use crate::command::Command;
use crate::error::CommandError;
use crate::furnace::OutputAction;
use crate::layout::ModeType;
use crate::reading::SensorReading;
use crate::settings::{ModeName, SettingsRecord};

use arbiter::ArbitrationPolicy;
use auto::AutoController;
use cool::{CoolController, DehumidifyState};
use driven::SensorDriven;
use heat::HeatController;
use input_map::InputMapController;
use passthrough::PassThroughController;
use staging::Stage;

#[derive(Debug, Clone)]
pub enum ModeController {
    PassThrough(PassThroughController),
    InputMap(InputMapController),
    Heat(HeatController),
    Cool(CoolController),
    Auto(AutoController),
}

impl ModeController {
    /// A controller holding default settings. Call `initialize_state`
    /// before feeding it events.
    pub fn new(mode_type: ModeType, policy: ArbitrationPolicy) -> Self {
        match mode_type {
            ModeType::PassThrough => Self::PassThrough(PassThroughController::default()),
            ModeType::InputMap => Self::InputMap(InputMapController::default()),
            ModeType::Heat => Self::Heat(HeatController::new(policy)),
            ModeType::Cool => Self::Cool(CoolController::new(policy)),
            ModeType::Auto => Self::Auto(AutoController::new(policy)),
        }
    }

    pub fn mode_type(&self) -> ModeType {
        match self {
            Self::PassThrough(_) => ModeType::PassThrough,
            Self::InputMap(_) => ModeType::InputMap,
            Self::Heat(_) => ModeType::Heat,
            Self::Cool(_) => ModeType::Cool,
            Self::Auto(_) => ModeType::Auto,
        }
    }

    pub fn name(&self) -> ModeName {
        match self {
            Self::PassThrough(mode) => mode.name,
            Self::InputMap(mode) => mode.name,
            Self::Heat(mode) => mode.name,
            Self::Cool(mode) => mode.name,
            Self::Auto(mode) => mode.cool.name,
        }
    }

    pub fn set_name(&mut self, name: ModeName) {
        match self {
            Self::PassThrough(mode) => mode.name = name,
            Self::InputMap(mode) => mode.name = name,
            Self::Heat(mode) => mode.name = name,
            Self::Cool(mode) => mode.name = name,
            Self::Auto(mode) => mode.cool.name = name,
        }
    }

    /// Snapshot of the live settings in their persisted form.
    pub fn settings(&self) -> SettingsRecord {
        match self {
            Self::PassThrough(mode) => SettingsRecord::PassThrough { name: mode.name },
            Self::InputMap(mode) => SettingsRecord::InputMap {
                name: mode.name,
                table: mode.table,
            },
            Self::Heat(mode) => SettingsRecord::Heat {
                name: mode.name,
                thermal: *mode.core.thermal(),
            },
            Self::Cool(mode) => SettingsRecord::Cool {
                name: mode.name,
                thermal: *mode.core.thermal(),
                dehumidify: mode.dehumidifier.settings,
            },
            Self::Auto(mode) => SettingsRecord::Auto {
                name: mode.cool.name,
                thermal: *mode.cool.core.thermal(),
                dehumidify: mode.cool.dehumidifier.settings,
                heat: mode.heat,
            },
        }
    }

    /// Replaces the live settings. A record of another mode type is ignored
    /// and `false` returned.
    pub fn load_settings(&mut self, record: SettingsRecord) -> bool {
        match (self, record) {
            (Self::PassThrough(mode), SettingsRecord::PassThrough { name }) => {
                mode.name = name;
            }
            (Self::InputMap(mode), SettingsRecord::InputMap { name, table }) => {
                mode.name = name;
                mode.table = table;
            }
            (Self::Heat(mode), SettingsRecord::Heat { name, thermal }) => {
                mode.name = name;
                mode.core.set_thermal(thermal);
            }
            (
                Self::Cool(mode),
                SettingsRecord::Cool {
                    name,
                    thermal,
                    dehumidify,
                },
            ) => {
                mode.name = name;
                mode.core.set_thermal(thermal);
                mode.dehumidifier.settings = dehumidify;
            }
            (
                Self::Auto(mode),
                SettingsRecord::Auto {
                    name,
                    thermal,
                    dehumidify,
                    heat,
                },
            ) => {
                mode.cool.name = name;
                mode.cool.core.set_thermal(thermal);
                mode.cool.dehumidifier.settings = dehumidify;
                mode.set_heat(heat);
            }
            (mode, record) => {
                debug!(
                    mode = %mode.mode_type(),
                    record = %record.mode_type(),
                    "ignoring settings for another mode type"
                );
                return false;
            }
        }
        true
    }

    /// Clears timers, staging, sensor arbitration and the fan toggle.
    pub fn initialize_state(&mut self, now_ms: u64) {
        match self {
            Self::PassThrough(_) | Self::InputMap(_) => {}
            Self::Heat(mode) => mode.core.initialize_state(now_ms),
            Self::Cool(mode) => mode.initialize_state(now_ms),
            Self::Auto(mode) => mode.initialize_state(now_ms),
        }
    }

    pub fn turn_furnace_off(&self) -> OutputAction {
        OutputAction::Update(self.core().map_or(0, SensorDriven::off_mask))
    }

    /// Sensor-driven modes ignore the thermostat lines.
    pub fn on_inputs_changed(&self, inputs: u8, _previous: u8) -> Vec<OutputAction> {
        match self {
            Self::PassThrough(mode) => mode.on_inputs_changed(inputs),
            Self::InputMap(mode) => mode.on_inputs_changed(inputs),
            Self::Heat(_) | Self::Cool(_) | Self::Auto(_) => Vec::new(),
        }
    }

    pub fn on_sensor_report(
        &mut self,
        sender_id: u8,
        reading: &SensorReading,
        now_ms: u64,
    ) -> Result<Vec<OutputAction>, CommandError> {
        let mode_type = self.mode_type();
        let core = self.core_mut().ok_or(CommandError::Unsupported {
            command: "sensor report",
            mode_type,
        })?;
        if !core.accept(sender_id, now_ms)? {
            debug!(sender_id, "suppressed by higher-priority sensor");
            return Ok(Vec::new());
        }

        Ok(match self {
            Self::Heat(mode) => mode.on_reading(reading, now_ms),
            Self::Cool(mode) => mode.on_reading(reading, now_ms),
            Self::Auto(mode) => mode.on_reading(reading, now_ms),
            Self::PassThrough(_) | Self::InputMap(_) => Vec::new(),
        })
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        match self {
            Self::PassThrough(_) | Self::InputMap(_) => Vec::new(),
            Self::Heat(mode) => mode.tick(now_ms),
            Self::Cool(mode) => mode.tick(now_ms),
            Self::Auto(mode) => mode.tick(now_ms),
        }
    }

    /// Applies a mode-specific settings command to the live settings.
    /// Nothing is persisted until commit.
    pub fn apply_settings(&mut self, command: &Command) -> Result<Vec<OutputAction>, CommandError> {
        let mode_type = self.mode_type();
        let unsupported = CommandError::Unsupported {
            command: command.keyword(),
            mode_type,
        };

        match (self, command) {
            (mode, Command::Name(name)) => {
                mode.set_name(*name);
                Ok(Vec::new())
            }
            (Self::InputMap(mode), Command::MapWrite { start, values }) => {
                mode.write(*start, values)?;
                Ok(Vec::new())
            }
            (Self::Heat(mode), Command::Thermal(update)) => Ok(mode.core.apply_thermal(update)),
            (Self::Cool(mode), Command::Thermal(update)) => Ok(mode.core.apply_thermal(update)),
            (Self::Auto(mode), Command::Thermal(update)) => {
                mode.stop_heating();
                Ok(mode.cool.core.apply_thermal(update))
            }
            (Self::Cool(mode), Command::Humidity(update)) => {
                update.apply_to(&mut mode.dehumidifier.settings);
                Ok(Vec::new())
            }
            (Self::Auto(mode), Command::Humidity(update)) => {
                update.apply_to(&mut mode.cool.dehumidifier.settings);
                Ok(Vec::new())
            }
            (Self::Auto(mode), Command::AutoHeat(update)) => {
                mode.apply_heat(update);
                Ok(Vec::new())
            }
            (Self::Heat(mode), Command::Fan(on)) => {
                let idle = !mode.core.is_engaged();
                Ok(mode.core.set_fan(*on, idle))
            }
            (Self::Cool(mode), Command::Fan(on)) => {
                let idle = !mode.core.is_engaged();
                Ok(mode.core.set_fan(*on, idle))
            }
            (Self::Auto(mode), Command::Fan(on)) => {
                let idle = mode.is_idle();
                Ok(mode.cool.core.set_fan(*on, idle))
            }
            _ => Err(unsupported),
        }
    }

    /// Target setpoint and last accepted temperature.
    pub fn target_and_actual(&self) -> Option<(i16, Option<i16>)> {
        match self {
            Self::PassThrough(_) | Self::InputMap(_) => None,
            Self::Heat(mode) => Some((mode.core.thermal().target_cx10, mode.core.last_actual())),
            Self::Cool(mode) => Some((mode.core.thermal().target_cx10, mode.core.last_actual())),
            Self::Auto(mode) => Some((mode.target_cx10(), mode.cool.core.last_actual())),
        }
    }

    pub fn fan_continuous(&self) -> Option<bool> {
        self.core().map(SensorDriven::fan_on)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.core().map(SensorDriven::stage)
    }

    pub fn heat_stage(&self) -> Option<Stage> {
        match self {
            Self::Auto(mode) => Some(mode.heat_stage()),
            _ => None,
        }
    }

    pub fn dehumidify(&self) -> Option<DehumidifyState> {
        match self {
            Self::Cool(mode) => Some(mode.dehumidifier.state()),
            Self::Auto(mode) => Some(mode.cool.dehumidifier.state()),
            _ => None,
        }
    }

    fn core(&self) -> Option<&SensorDriven> {
        match self {
            Self::PassThrough(_) | Self::InputMap(_) => None,
            Self::Heat(mode) => Some(&mode.core),
            Self::Cool(mode) => Some(&mode.core),
            Self::Auto(mode) => Some(&mode.cool.core),
        }
    }

    fn core_mut(&mut self) -> Option<&mut SensorDriven> {
        match self {
            Self::PassThrough(_) | Self::InputMap(_) => None,
            Self::Heat(mode) => Some(&mut mode.core),
            Self::Cool(mode) => Some(&mut mode.core),
            Self::Auto(mode) => Some(&mut mode.cool.core),
        }
    }
}
