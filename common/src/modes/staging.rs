use serde::Serialize;

use crate::settings::{HeatStageSettings, ThermalSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Off,
    Stage1,
    Stage2,
    Stage3,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Stage1 => "STAGE1",
            Self::Stage2 => "STAGE2",
            Self::Stage3 => "STAGE3",
        }
    }

    pub fn is_engaged(self) -> bool {
        self != Self::Off
    }
}

/// Both thresholds count from stage 1 entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimes {
    pub to_stage2_ms: u64,
    pub to_stage3_ms: u64,
}

impl StageTimes {
    pub fn from_thermal(thermal: &ThermalSettings) -> Self {
        Self {
            to_stage2_ms: u64::from(thermal.seconds_to_stage2) * 1_000,
            to_stage3_ms: u64::from(thermal.seconds_to_stage3) * 1_000,
        }
    }

    pub fn stage_after(&self, elapsed_ms: u64) -> Stage {
        if elapsed_ms >= self.to_stage3_ms {
            Stage::Stage3
        } else if elapsed_ms >= self.to_stage2_ms {
            Stage::Stage2
        } else {
            Stage::Stage1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMasks {
    pub stage1: u8,
    pub stage2: u8,
    pub stage3: u8,
}

impl StageMasks {
    pub fn mask(&self, stage: Stage) -> Option<u8> {
        match stage {
            Stage::Off => None,
            Stage::Stage1 => Some(self.stage1),
            Stage::Stage2 => Some(self.stage2),
            Stage::Stage3 => Some(self.stage3),
        }
    }
}

impl From<&ThermalSettings> for StageMasks {
    fn from(thermal: &ThermalSettings) -> Self {
        Self {
            stage1: thermal.stage1_mask,
            stage2: thermal.stage2_mask,
            stage3: thermal.stage3_mask,
        }
    }
}

impl From<&HeatStageSettings> for StageMasks {
    fn from(heat: &HeatStageSettings) -> Self {
        Self {
            stage1: heat.stage1_mask,
            stage2: heat.stage2_mask,
            stage3: heat.stage3_mask,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Staging {
    stage: Stage,
    entered_stage1_ms: u64,
}

impl Staging {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_engaged(&self) -> bool {
        self.stage.is_engaged()
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Off;
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.stage = Stage::Off;
        self.entered_stage1_ms = now_ms;
    }

    /// Called while the activation predicate holds.
    pub fn demand(&mut self, now_ms: u64, times: &StageTimes) -> Stage {
        self.stage = if self.is_engaged() {
            times.stage_after(now_ms.saturating_sub(self.entered_stage1_ms))
        } else {
            self.entered_stage1_ms = now_ms;
            Stage::Stage1
        };
        self.stage
    }

    /// Moves to a later stage once its threshold has passed. Returns the
    /// new stage only when it changed.
    pub fn advance(&mut self, now_ms: u64, times: &StageTimes) -> Option<Stage> {
        if !self.is_engaged() {
            return None;
        }

        let next = times.stage_after(now_ms.saturating_sub(self.entered_stage1_ms));
        if next > self.stage {
            self.stage = next;
            Some(next)
        } else {
            None
        }
    }
}
