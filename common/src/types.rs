use serde::Serialize;

use crate::layout::ModeType;

#[derive(Debug, Clone, Serialize)]
pub struct ModeStatus {
    #[serde(rename = "modeType")]
    pub mode_type: ModeType,
    pub slot: u8,
    pub name: String,
    #[serde(rename = "targetCx10")]
    pub target_cx10: Option<i16>,
    #[serde(rename = "actualCx10")]
    pub actual_cx10: Option<i16>,
    #[serde(rename = "fanContinuous")]
    pub fan_continuous: Option<bool>,
    pub stage: Option<&'static str>,
    #[serde(rename = "heatStage")]
    pub heat_stage: Option<&'static str>,
    pub dehumidify: Option<&'static str>,
    pub inputs: u8,
    pub outputs: u8,
}

impl ModeStatus {
    /// One-line summary in the style of the serial console.
    pub fn summary(&self) -> String {
        let temps = match (self.target_cx10, self.actual_cx10) {
            (Some(target), Some(actual)) => format!(" {} / {}", tenths(target), tenths(actual)),
            (Some(target), None) => format!(" {} / --", tenths(target)),
            _ => String::new(),
        };
        let fan = match self.fan_continuous {
            Some(true) => '1',
            Some(false) => '0',
            None => '-',
        };
        format!(
            "{}:{} {}{} fan={} out={:#04x}",
            self.mode_type, self.slot, self.name, temps, fan, self.outputs
        )
    }
}

fn tenths(value: i16) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = i32::from(value).abs();
    format!("{sign}{}.{}", magnitude / 10, magnitude % 10)
}
