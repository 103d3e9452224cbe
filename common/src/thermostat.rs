use tracing::debug;

use crate::command::Command;
use crate::config::ControllerConfig;
use crate::error::{CommandError, StoreError};
use crate::furnace::{Furnace, OutputAction, OutputLatch};
use crate::layout::ModeType;
use crate::modes::ModeController;
use crate::reading::SensorReading;
use crate::registry::ActiveModeRegistry;
use crate::store::{Eeprom, SettingsStore};
use crate::types::ModeStatus;

/// One inbound text packet. `to_me` is decided by the transport: packets
/// not addressed to this device are sensor reports.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    pub sender_id: u8,
    pub to_me: bool,
    pub text: &'a str,
}

/// Everything the host drives. Each entry point returns the output writes
/// the host must apply to its furnace lines; the same writes are mirrored
/// into an internal latch for status reporting.
#[derive(Debug)]
pub struct Thermostat<E> {
    config: ControllerConfig,
    store: SettingsStore<E>,
    registry: ActiveModeRegistry,
    outputs: OutputLatch,
    inputs: u8,
}

impl<E: Eeprom> Thermostat<E> {
    pub fn boot(
        mut config: ControllerConfig,
        eeprom: E,
        now_ms: u64,
    ) -> Result<(Self, Vec<OutputAction>), StoreError> {
        config.sanitize();
        let store = SettingsStore::new(eeprom, config.layout());
        let (registry, actions) = ActiveModeRegistry::restore(&store, config.arbitration(), now_ms)?;

        let mut thermostat = Self {
            config,
            store,
            registry,
            outputs: OutputLatch::new(),
            inputs: 0,
        };
        thermostat.outputs.apply(&actions);
        Ok((thermostat, actions))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn handle_packet(
        &mut self,
        packet: &Packet<'_>,
        now_ms: u64,
    ) -> Result<Vec<OutputAction>, CommandError> {
        if packet.to_me {
            self.handle_command(packet.text, now_ms)
        } else {
            self.handle_sensor_report(packet.sender_id, packet.text, now_ms)
        }
    }

    pub fn handle_command(
        &mut self,
        text: &str,
        now_ms: u64,
    ) -> Result<Vec<OutputAction>, CommandError> {
        let command = Command::parse(text.trim())?;
        let (mode_type, slot) = self.registry.active();
        debug!(command = command.keyword(), %mode_type, slot, "applying command");

        let actions = match command {
            Command::SetSlotCount { mode_type, count } => {
                self.store.set_slot_count(mode_type, count)?;
                Vec::new()
            }
            Command::SwitchMode { mode_type, slot } => {
                self.registry
                    .switch(&mut self.store, mode_type, slot, now_ms)?
            }
            Command::Commit => {
                self.registry.commit(&mut self.store)?;
                Vec::new()
            }
            other => self.registry.controller_mut().apply_settings(&other)?,
        };

        self.outputs.apply(&actions);
        Ok(actions)
    }

    pub fn handle_sensor_report(
        &mut self,
        sender_id: u8,
        text: &str,
        now_ms: u64,
    ) -> Result<Vec<OutputAction>, CommandError> {
        let reading = SensorReading::parse(text).ok_or(CommandError::MalformedReading)?;
        let actions = self
            .registry
            .controller_mut()
            .on_sensor_report(sender_id, &reading, now_ms)?;

        self.outputs.apply(&actions);
        Ok(actions)
    }

    pub fn inputs_changed(&mut self, inputs: u8) -> Vec<OutputAction> {
        let previous = std::mem::replace(&mut self.inputs, inputs);
        let actions = self
            .registry
            .controller()
            .on_inputs_changed(inputs, previous);

        self.outputs.apply(&actions);
        actions
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<OutputAction> {
        let actions = self.registry.controller_mut().tick(now_ms);
        self.outputs.apply(&actions);
        actions
    }

    pub fn active_mode(&self) -> (ModeType, u8) {
        self.registry.active()
    }

    pub fn controller(&self) -> &ModeController {
        self.registry.controller()
    }

    pub fn store(&self) -> &SettingsStore<E> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SettingsStore<E> {
        &mut self.store
    }

    pub fn output_mask(&self) -> u8 {
        self.outputs.mask()
    }

    pub fn status(&self) -> ModeStatus {
        let (mode_type, slot) = self.registry.active();
        let controller = self.registry.controller();
        let (target_cx10, actual_cx10) = match controller.target_and_actual() {
            Some((target, actual)) => (Some(target), actual),
            None => (None, None),
        };

        ModeStatus {
            mode_type,
            slot,
            name: controller.name().to_string(),
            target_cx10,
            actual_cx10,
            fan_continuous: controller.fan_continuous(),
            stage: controller.stage().map(|stage| stage.as_str()),
            heat_stage: controller.heat_stage().map(|stage| stage.as_str()),
            dehumidify: controller.dehumidify().map(|state| state.as_str()),
            inputs: self.inputs,
            outputs: self.outputs.mask(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEeprom;

    fn boot() -> Thermostat<MemoryEeprom> {
        let (thermostat, _) =
            Thermostat::boot(ControllerConfig::default(), MemoryEeprom::new(1_024), 0).unwrap();
        thermostat
    }

    #[test]
    fn fresh_device_passes_inputs_through() {
        let mut thermostat = boot();

        assert_eq!(
            thermostat.inputs_changed(0x8B),
            vec![OutputAction::Update(0x0B)]
        );
        assert_eq!(thermostat.output_mask(), 0x0B);
        assert_eq!(thermostat.status().name, "PASS");
    }

    #[test]
    fn packet_routing_follows_addressing() {
        let mut thermostat = boot();

        let addressed = Packet {
            sender_id: 9,
            to_me: true,
            text: "T:+20.00",
        };
        assert_eq!(
            thermostat.handle_packet(&addressed, 0),
            Err(CommandError::NotRecognized)
        );

        let overheard = Packet {
            sender_id: 9,
            to_me: false,
            text: "HVAC TYPE=2 COUNT=1",
        };
        assert_eq!(
            thermostat.handle_packet(&overheard, 0),
            Err(CommandError::MalformedReading)
        );
        assert_eq!(thermostat.store().slot_count(ModeType::Heat), Ok(0));
    }

    #[test]
    fn status_reports_sensor_driven_fields() {
        let mut thermostat = boot();
        for command in [
            "HVAC TYPE=4 COUNT=1",
            "HVAC TYPE=4 MODE=0",
            "HVAC NAME=AUTO",
            "HVAC_SETTINGS 240 246 2 10 01 20 22 26 600 1200",
            "AUTO_SETTINGS 200",
        ] {
            thermostat.handle_command(command, 0).unwrap();
        }
        thermostat.handle_sensor_report(1, "C:1, B:200, T:+19.00", 1_000).unwrap();

        let status = thermostat.status();
        assert_eq!(status.name, "AUTO");
        assert_eq!(status.target_cx10, Some(200));
        assert_eq!(status.actual_cx10, Some(190));
        assert_eq!(status.fan_continuous, Some(false));
        assert_eq!(status.stage, Some("OFF"));
        assert_eq!(status.heat_stage, Some("STAGE1"));
        assert_eq!(status.dehumidify, Some("OFF"));
        assert_eq!(status.outputs, 0x00);
    }
}
