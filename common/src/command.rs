//! Text protocol accepted from the serial console and from radio packets
//! addressed to this device.
//!
//! Keywords match case-insensitively. Field values are sliced out of the
//! original text so names keep their case.

use crate::error::CommandError;
use crate::layout::ModeType;
use crate::scan::Cursor;
use crate::settings::{
    DehumidifySettings, HeatStageSettings, ModeName, ThermalSettings, HUMIDITY_DISABLED,
};

const ADMIN_PREFIX: &str = "HVAC ";
const TYPE_KEY: &str = "TYPE=";
const NAME_KEY: &str = "NAME=";
const COMMIT_KEY: &str = " COMMIT";
const FAN_PREFIX: &str = "HVAC FAN=O";
const MODE_KEY: &str = "MODE=";
const COUNT_KEY: &str = "COUNT=";
const THERMAL_KEY: &str = "HVAC_SETTINGS";
const HUMIDITY_KEY: &str = "HUM_SETTINGS";
const AUTO_HEAT_KEY: &str = "AUTO_SETTINGS";
const MAP_PREFIX: &str = "HVACMAP=0X";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetSlotCount { mode_type: ModeType, count: u8 },
    SwitchMode { mode_type: ModeType, slot: i32 },
    Name(ModeName),
    Commit,
    Fan(bool),
    Thermal(ThermalUpdate),
    Humidity(HumidityUpdate),
    AutoHeat(AutoHeatUpdate),
    MapWrite { start: u32, values: Vec<u8> },
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let upper = text.to_ascii_uppercase();

        if upper.starts_with(ADMIN_PREFIX) {
            return parse_admin(text, &upper);
        }
        if let Some(at) = upper.find(THERMAL_KEY) {
            return ThermalUpdate::parse(&text[at + THERMAL_KEY.len()..]).map(Self::Thermal);
        }
        if let Some(at) = upper.find(HUMIDITY_KEY) {
            return Ok(Self::Humidity(HumidityUpdate::parse(
                &text[at + HUMIDITY_KEY.len()..],
            )));
        }
        if let Some(at) = upper.find(AUTO_HEAT_KEY) {
            return AutoHeatUpdate::parse(&text[at + AUTO_HEAT_KEY.len()..]).map(Self::AutoHeat);
        }
        if upper.starts_with(MAP_PREFIX) {
            let mut cursor = Cursor::new(&text[MAP_PREFIX.len()..]);
            let start = cursor.hex();
            let mut values = Vec::new();
            while let Some(value) = cursor.hex_field() {
                values.push(value as u8);
            }
            return Ok(Self::MapWrite { start, values });
        }

        Err(CommandError::NotRecognized)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::SetSlotCount { .. } => "COUNT",
            Self::SwitchMode { .. } => "MODE",
            Self::Name(_) => "NAME",
            Self::Commit => "COMMIT",
            Self::Fan(_) => "FAN",
            Self::Thermal(_) => THERMAL_KEY,
            Self::Humidity(_) => HUMIDITY_KEY,
            Self::AutoHeat(_) => AUTO_HEAT_KEY,
            Self::MapWrite { .. } => "HVACMAP",
        }
    }

    /// Whether the command is handled by the registry and store rather than
    /// by the active mode.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            Self::SetSlotCount { .. } | Self::SwitchMode { .. } | Self::Commit
        )
    }
}

fn parse_admin(text: &str, upper: &str) -> Result<Command, CommandError> {
    let mode_type = match upper.find(TYPE_KEY) {
        Some(at) => {
            let value = Cursor::new(&text[at + TYPE_KEY.len()..]).decimal();
            let mode_type = usize::try_from(value)
                .ok()
                .and_then(ModeType::from_index)
                .ok_or(CommandError::TypeOutOfRange(value))?;
            Some(mode_type)
        }
        None => None,
    };

    if let Some(at) = upper.find(NAME_KEY) {
        return Ok(Command::Name(ModeName::new(&text[at + NAME_KEY.len()..])));
    }

    if let Some(at) = upper.find(COMMIT_KEY) {
        let after = &upper[at + COMMIT_KEY.len()..];
        if after.chars().next().is_some_and(|ch| !ch.is_whitespace()) {
            return Err(CommandError::NotRecognized);
        }
        return Ok(Command::Commit);
    }

    if let Some(rest) = upper.strip_prefix(FAN_PREFIX) {
        return Ok(Command::Fan(rest.starts_with('N')));
    }

    if let Some(at) = upper.find(MODE_KEY) {
        let mode_type = mode_type.ok_or(CommandError::MissingField("TYPE"))?;
        let slot = Cursor::new(&text[at + MODE_KEY.len()..]).decimal();
        return Ok(Command::SwitchMode { mode_type, slot });
    }

    if let Some(at) = upper.find(COUNT_KEY) {
        let mode_type = mode_type.ok_or(CommandError::MissingField("TYPE"))?;
        let value = Cursor::new(&text[at + COUNT_KEY.len()..]).decimal();
        let count = u8::try_from(value).map_err(|_| CommandError::CountOutOfRange(value))?;
        return Ok(Command::SetSlotCount { mode_type, count });
    }

    Err(CommandError::NotRecognized)
}

/// `HVAC_SETTINGS` fields. Fields are positional, so once one is missing
/// every later one is too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalUpdate {
    pub target_cx10: i16,
    pub activate_cx10: Option<i16>,
    pub sensor_mask: Option<u32>,
    pub fan_mask: Option<u8>,
    pub always_on_mask: Option<u8>,
    pub stage1_mask: Option<u8>,
    pub stage2_mask: Option<u8>,
    pub stage3_mask: Option<u8>,
    pub seconds_to_stage2: Option<u16>,
    pub seconds_to_stage3: Option<u16>,
}

impl ThermalUpdate {
    fn parse(fields: &str) -> Result<Self, CommandError> {
        let mut cursor = Cursor::new(fields);
        let target_cx10 = cursor
            .decimal_field()
            .map(saturate_i16)
            .ok_or(CommandError::MissingField("target"))?;

        Ok(Self {
            target_cx10,
            activate_cx10: cursor.decimal_field().map(saturate_i16),
            sensor_mask: cursor.hex_field(),
            fan_mask: cursor.hex_field().map(low_byte),
            always_on_mask: cursor.hex_field().map(low_byte),
            stage1_mask: cursor.hex_field().map(low_byte),
            stage2_mask: cursor.hex_field().map(low_byte),
            stage3_mask: cursor.hex_field().map(low_byte),
            seconds_to_stage2: cursor.decimal_field().map(saturate_u16),
            seconds_to_stage3: cursor.decimal_field().map(saturate_u16),
        })
    }

    /// Applies the given fields. `default_activate` is used when the
    /// activate temperature was omitted.
    pub fn apply_to(&self, thermal: &mut ThermalSettings, default_activate: i16) {
        thermal.target_cx10 = self.target_cx10;
        thermal.activate_cx10 = self.activate_cx10.unwrap_or(default_activate);

        if let Some(mask) = self.sensor_mask {
            thermal.sensor_mask = mask;
        }
        if let Some(mask) = self.fan_mask {
            thermal.fan_mask = mask;
        }
        if let Some(mask) = self.always_on_mask {
            thermal.always_on_mask = mask;
        }
        if let Some(mask) = self.stage1_mask {
            thermal.stage1_mask = mask;
        }
        if let Some(mask) = self.stage2_mask {
            thermal.stage2_mask = mask;
        }
        if let Some(mask) = self.stage3_mask {
            thermal.stage3_mask = mask;
        }
        if let Some(seconds) = self.seconds_to_stage2 {
            thermal.seconds_to_stage2 = seconds;
        }
        if let Some(seconds) = self.seconds_to_stage3 {
            thermal.seconds_to_stage3 = seconds;
        }
    }
}

/// `HUM_SETTINGS` fields. With no target, dehumidify is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HumidityUpdate {
    pub target_x10: Option<u16>,
    pub on_mask: Option<u8>,
    pub off_mask: Option<u8>,
}

impl HumidityUpdate {
    fn parse(fields: &str) -> Self {
        let mut cursor = Cursor::new(fields);
        Self {
            target_x10: cursor.decimal_field().map(saturate_u16),
            on_mask: cursor.hex_field().map(low_byte),
            off_mask: cursor.hex_field().map(low_byte),
        }
    }

    pub fn apply_to(&self, dehumidify: &mut DehumidifySettings) {
        dehumidify.target_x10 = self.target_x10.unwrap_or(HUMIDITY_DISABLED);
        if let Some(mask) = self.on_mask {
            dehumidify.on_mask = mask;
        }
        if let Some(mask) = self.off_mask {
            dehumidify.off_mask = mask;
        }
    }
}

/// `AUTO_SETTINGS` fields for Auto's heating side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoHeatUpdate {
    pub target_cx10: i16,
    pub activate_cx10: Option<i16>,
    pub stage1_mask: Option<u8>,
    pub stage2_mask: Option<u8>,
    pub stage3_mask: Option<u8>,
}

impl AutoHeatUpdate {
    fn parse(fields: &str) -> Result<Self, CommandError> {
        let mut cursor = Cursor::new(fields);
        let target_cx10 = cursor
            .decimal_field()
            .map(saturate_i16)
            .ok_or(CommandError::MissingField("heat target"))?;

        Ok(Self {
            target_cx10,
            activate_cx10: cursor.decimal_field().map(saturate_i16),
            stage1_mask: cursor.hex_field().map(low_byte),
            stage2_mask: cursor.hex_field().map(low_byte),
            stage3_mask: cursor.hex_field().map(low_byte),
        })
    }

    /// Stage 2 and 3 fall back to the stage 1 mask when only it is given.
    pub fn apply_to(&self, heat: &mut HeatStageSettings, default_activate: i16) {
        heat.target_cx10 = self.target_cx10;
        heat.activate_cx10 = self.activate_cx10.unwrap_or(default_activate);

        if let Some(mask) = self.stage1_mask {
            heat.stage1_mask = mask;
            heat.stage2_mask = mask;
            heat.stage3_mask = mask;
        }
        if let Some(mask) = self.stage2_mask {
            heat.stage2_mask = mask;
        }
        if let Some(mask) = self.stage3_mask {
            heat.stage3_mask = mask;
        }
    }
}

fn saturate_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn saturate_u16(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

// output masks are one shift-register byte wide
fn low_byte(value: u32) -> u8 {
    (value & 0xFF) as u8
}
