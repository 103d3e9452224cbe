pub mod command;
pub mod config;
pub mod error;
pub mod furnace;
pub mod layout;
pub mod modes;
pub mod reading;
pub mod registry;
pub mod scan;
pub mod settings;
pub mod signals;
pub mod store;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use command::Command;
pub use config::{ControllerConfig, NetworkConfig, RuntimeConfig};
pub use error::{CommandError, StoreError};
pub use furnace::{Furnace, OutputAction, OutputLatch};
pub use layout::{ModeType, RecordLayout, SlotCounts};
pub use modes::arbiter::{ArbitrationPolicy, SensorPriority};
pub use modes::ModeController;
pub use reading::SensorReading;
pub use registry::ActiveModeRegistry;
pub use settings::{ModeName, SettingsRecord};
pub use store::{Eeprom, MemoryEeprom, SettingsStore};
pub use thermostat::{Packet, Thermostat};
pub use topics::*;
pub use types::ModeStatus;
