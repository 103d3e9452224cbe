use std::fmt;

use serde::Serialize;

use crate::layout::{Block, ModeType};
use crate::signals::NUM_INPUT_COMBINATIONS;

pub const NAME_LENGTH: usize = 5;
pub const HUMIDITY_DISABLED: u16 = 0xFFFF;
pub const MAP_PASS_THROUGH: u8 = 0xFF;

/// Activate temperature offset from target when none is configured (0.6 C).
pub const DEFAULT_ACTIVATE_OFFSET_CX10: i16 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeName([u8; NAME_LENGTH]);

impl ModeName {
    /// Takes up to five bytes, stopping at whitespace.
    pub fn new(text: &str) -> Self {
        let mut name = [0u8; NAME_LENGTH];
        for (slot, byte) in name.iter_mut().zip(
            text.bytes()
                .take_while(|byte| !byte.is_ascii_whitespace() && *byte != 0),
        ) {
            *slot = byte;
        }
        Self(name)
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(NAME_LENGTH);
        &self.0[..len]
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
        out.push(0);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Self {
        let mut name = [0u8; NAME_LENGTH];
        for byte in &mut name {
            *byte = reader.u8();
        }
        reader.u8();
        Self(name)
    }
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl Serialize for ModeName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Staged sensor-driven control, shared by Heat, Cool and Auto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThermalSettings {
    pub target_cx10: i16,
    pub activate_cx10: i16,
    pub sensor_mask: u32,
    pub fan_mask: u8,
    pub always_on_mask: u8,
    pub stage1_mask: u8,
    pub stage2_mask: u8,
    pub stage3_mask: u8,
    pub seconds_to_stage2: u16,
    pub seconds_to_stage3: u16,
}

impl ThermalSettings {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_cx10.to_le_bytes());
        out.extend_from_slice(&self.activate_cx10.to_le_bytes());
        out.extend_from_slice(&self.sensor_mask.to_le_bytes());
        out.extend_from_slice(&[
            self.fan_mask,
            self.always_on_mask,
            self.stage1_mask,
            self.stage2_mask,
            self.stage3_mask,
        ]);
        out.extend_from_slice(&self.seconds_to_stage2.to_le_bytes());
        out.extend_from_slice(&self.seconds_to_stage3.to_le_bytes());
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Self {
        Self {
            target_cx10: reader.i16(),
            activate_cx10: reader.i16(),
            sensor_mask: reader.u32(),
            fan_mask: reader.u8(),
            always_on_mask: reader.u8(),
            stage1_mask: reader.u8(),
            stage2_mask: reader.u8(),
            stage3_mask: reader.u8(),
            seconds_to_stage2: reader.u16(),
            seconds_to_stage3: reader.u16(),
        }
    }

    pub fn sensor_timeout_ms(&self) -> u64 {
        u64::from(self.seconds_to_stage3) * 2_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DehumidifySettings {
    pub on_mask: u8,
    pub off_mask: u8,
    pub target_x10: u16,
}

impl Default for DehumidifySettings {
    fn default() -> Self {
        Self {
            on_mask: 0,
            off_mask: 0,
            target_x10: HUMIDITY_DISABLED,
        }
    }
}

impl DehumidifySettings {
    pub fn is_enabled(&self) -> bool {
        self.target_x10 != HUMIDITY_DISABLED
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.on_mask, self.off_mask]);
        out.extend_from_slice(&self.target_x10.to_le_bytes());
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Self {
        Self {
            on_mask: reader.u8(),
            off_mask: reader.u8(),
            target_x10: reader.u16(),
        }
    }
}

/// Auto mode's private heating side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeatStageSettings {
    pub target_cx10: i16,
    pub activate_cx10: i16,
    pub stage1_mask: u8,
    pub stage2_mask: u8,
    pub stage3_mask: u8,
}

impl HeatStageSettings {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_cx10.to_le_bytes());
        out.extend_from_slice(&self.activate_cx10.to_le_bytes());
        out.extend_from_slice(&[self.stage1_mask, self.stage2_mask, self.stage3_mask]);
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Self {
        Self {
            target_cx10: reader.i16(),
            activate_cx10: reader.i16(),
            stage1_mask: reader.u8(),
            stage2_mask: reader.u8(),
            stage3_mask: reader.u8(),
        }
    }
}

pub type MapTable = [u8; NUM_INPUT_COMBINATIONS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsRecord {
    PassThrough {
        name: ModeName,
    },
    InputMap {
        name: ModeName,
        table: MapTable,
    },
    Heat {
        name: ModeName,
        thermal: ThermalSettings,
    },
    Cool {
        name: ModeName,
        thermal: ThermalSettings,
        dehumidify: DehumidifySettings,
    },
    Auto {
        name: ModeName,
        thermal: ThermalSettings,
        dehumidify: DehumidifySettings,
        heat: HeatStageSettings,
    },
}

struct Parts<'a> {
    name: &'a mut ModeName,
    table: Option<&'a mut MapTable>,
    thermal: Option<&'a mut ThermalSettings>,
    dehumidify: Option<&'a mut DehumidifySettings>,
    heat: Option<&'a mut HeatStageSettings>,
}

impl SettingsRecord {
    pub fn defaults(mode_type: ModeType) -> Self {
        let name = ModeName::default();
        match mode_type {
            ModeType::PassThrough => Self::PassThrough {
                name: ModeName::new("PASS"),
            },
            ModeType::InputMap => Self::InputMap {
                name,
                table: [MAP_PASS_THROUGH; NUM_INPUT_COMBINATIONS],
            },
            ModeType::Heat => Self::Heat {
                name,
                thermal: ThermalSettings::default(),
            },
            ModeType::Cool => Self::Cool {
                name,
                thermal: ThermalSettings::default(),
                dehumidify: DehumidifySettings::default(),
            },
            ModeType::Auto => Self::Auto {
                name,
                thermal: ThermalSettings::default(),
                dehumidify: DehumidifySettings::default(),
                heat: HeatStageSettings::default(),
            },
        }
    }

    pub fn mode_type(&self) -> ModeType {
        match self {
            Self::PassThrough { .. } => ModeType::PassThrough,
            Self::InputMap { .. } => ModeType::InputMap,
            Self::Heat { .. } => ModeType::Heat,
            Self::Cool { .. } => ModeType::Cool,
            Self::Auto { .. } => ModeType::Auto,
        }
    }

    pub fn name(&self) -> &ModeName {
        match self {
            Self::PassThrough { name }
            | Self::InputMap { name, .. }
            | Self::Heat { name, .. }
            | Self::Cool { name, .. }
            | Self::Auto { name, .. } => name,
        }
    }

    /// Serialises the record block by block, in the order the mode type's
    /// descriptor lists them.
    pub fn encode(&self) -> Vec<u8> {
        let (table, thermal, dehumidify, heat) = match self {
            Self::PassThrough { .. } => (None, None, None, None),
            Self::InputMap { table, .. } => (Some(table), None, None, None),
            Self::Heat { thermal, .. } => (None, Some(thermal), None, None),
            Self::Cool {
                thermal,
                dehumidify,
                ..
            } => (None, Some(thermal), Some(dehumidify), None),
            Self::Auto {
                thermal,
                dehumidify,
                heat,
                ..
            } => (None, Some(thermal), Some(dehumidify), Some(heat)),
        };

        let mode_type = self.mode_type();
        let mut out = Vec::with_capacity(mode_type.record_size());
        for block in mode_type.blocks() {
            match block {
                Block::Name => self.name().write_to(&mut out),
                Block::Table => out.extend_from_slice(
                    table.unwrap_or(&[MAP_PASS_THROUGH; NUM_INPUT_COMBINATIONS]),
                ),
                Block::Thermal => thermal.copied().unwrap_or_default().write_to(&mut out),
                Block::Dehumidify => dehumidify.copied().unwrap_or_default().write_to(&mut out),
                Block::HeatStage => heat.copied().unwrap_or_default().write_to(&mut out),
            }
        }
        out
    }

    /// Rebuilds a record from exactly `record_size` bytes.
    pub fn decode(mode_type: ModeType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != mode_type.record_size() {
            return None;
        }

        let mut record = Self::defaults(mode_type);
        let mut reader = ByteReader::new(bytes);
        let Parts {
            name,
            mut table,
            mut thermal,
            mut dehumidify,
            mut heat,
        } = record.parts_mut();

        for block in mode_type.blocks() {
            match block {
                Block::Name => *name = ModeName::read_from(&mut reader),
                Block::Table => {
                    let mut decoded = [0u8; NUM_INPUT_COMBINATIONS];
                    for entry in &mut decoded {
                        *entry = reader.u8();
                    }
                    if let Some(table) = table.as_deref_mut() {
                        *table = decoded;
                    }
                }
                Block::Thermal => {
                    let decoded = ThermalSettings::read_from(&mut reader);
                    if let Some(thermal) = thermal.as_deref_mut() {
                        *thermal = decoded;
                    }
                }
                Block::Dehumidify => {
                    let decoded = DehumidifySettings::read_from(&mut reader);
                    if let Some(dehumidify) = dehumidify.as_deref_mut() {
                        *dehumidify = decoded;
                    }
                }
                Block::HeatStage => {
                    let decoded = HeatStageSettings::read_from(&mut reader);
                    if let Some(heat) = heat.as_deref_mut() {
                        *heat = decoded;
                    }
                }
            }
        }
        Some(record)
    }

    fn parts_mut(&mut self) -> Parts<'_> {
        match self {
            Self::PassThrough { name } => Parts {
                name,
                table: None,
                thermal: None,
                dehumidify: None,
                heat: None,
            },
            Self::InputMap { name, table } => Parts {
                name,
                table: Some(table),
                thermal: None,
                dehumidify: None,
                heat: None,
            },
            Self::Heat { name, thermal } => Parts {
                name,
                table: None,
                thermal: Some(thermal),
                dehumidify: None,
                heat: None,
            },
            Self::Cool {
                name,
                thermal,
                dehumidify,
            } => Parts {
                name,
                table: None,
                thermal: Some(thermal),
                dehumidify: Some(dehumidify),
                heat: None,
            },
            Self::Auto {
                name,
                thermal,
                dehumidify,
                heat,
            } => Parts {
                name,
                table: None,
                thermal: Some(thermal),
                dehumidify: Some(dehumidify),
                heat: Some(heat),
            },
        }
    }
}

/// Little-endian reader over a record that has already been length-checked.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let byte = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        byte
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes([self.u8(), self.u8()])
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes([self.u8(), self.u8()])
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes([self.u8(), self.u8(), self.u8(), self.u8()])
    }
}
