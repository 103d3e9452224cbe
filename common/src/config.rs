use serde::{Deserialize, Serialize};

use crate::layout::RecordLayout;
use crate::modes::arbiter::{ArbitrationPolicy, SensorPriority, DEFAULT_PRIORITY_WINDOW_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub eeprom_base: u16,
    pub eeprom_capacity: usize,
    pub sensor_window_ms: u64,
    pub sensor_priority: SensorPriority,
    pub tick_interval_ms: u64,
    pub state_publish_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            eeprom_base: 32,
            eeprom_capacity: 1_024,
            sensor_window_ms: DEFAULT_PRIORITY_WINDOW_MS,
            sensor_priority: SensorPriority::LowerIdWins,
            tick_interval_ms: 1_000,
            state_publish_interval_ms: 10_000,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.eeprom_capacity = self.eeprom_capacity.clamp(64, 65_536);
        // selector and count table must fit
        let max_base = self.eeprom_capacity.saturating_sub(16);
        if usize::from(self.eeprom_base) > max_base {
            self.eeprom_base = 0;
        }
        if self.sensor_window_ms == 0 {
            self.sensor_window_ms = DEFAULT_PRIORITY_WINDOW_MS;
        }
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 60_000);
        self.state_publish_interval_ms = self.state_publish_interval_ms.clamp(1_000, 3_600_000);
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.eeprom_base)
    }

    pub fn arbitration(&self) -> ArbitrationPolicy {
        ArbitrationPolicy {
            priority: self.sensor_priority,
            window_ms: self.sensor_window_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    /// Radio node id of this controller. Packets from it are never sensor
    /// reports.
    pub node_id: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            node_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.controller.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let mut config: RuntimeConfig =
            serde_json::from_str(r#"{"controller":{"sensor_priority":"HIGHER_ID_WINS"}}"#).unwrap();
        config.sanitize();

        assert_eq!(config.controller.eeprom_base, 32);
        assert_eq!(
            config.controller.arbitration().priority,
            SensorPriority::HigherIdWins
        );
        assert_eq!(config.network.mqtt_port, 1883);
    }

    #[test]
    fn sanitize_pulls_base_inside_capacity() {
        let mut config = ControllerConfig {
            eeprom_base: 5_000,
            eeprom_capacity: 1_024,
            tick_interval_ms: 0,
            ..ControllerConfig::default()
        };
        config.sanitize();

        assert_eq!(config.eeprom_base, 0);
        assert_eq!(config.tick_interval_ms, 100);
    }
}
