use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIORITY_WINDOW_MS: u64 = 15 * 60 * 1_000;

/// Which of two sensors in the mask wins while both are reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorPriority {
    #[default]
    LowerIdWins,
    HigherIdWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrationPolicy {
    pub priority: SensorPriority,
    pub window_ms: u64,
}

impl Default for ArbitrationPolicy {
    fn default() -> Self {
        Self {
            priority: SensorPriority::default(),
            window_ms: DEFAULT_PRIORITY_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    NotInMask,
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct SensorArbiter {
    policy: ArbitrationPolicy,
    last_id: u8,
    last_heard_ms: u64,
}

impl SensorArbiter {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self {
            policy,
            last_id: 0,
            last_heard_ms: 0,
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.last_id = 0;
        self.last_heard_ms = now_ms;
    }

    pub fn offer(&mut self, sender_id: u8, sensor_mask: u32, now_ms: u64) -> Verdict {
        let bit = 1u32.checked_shl(u32::from(sender_id)).unwrap_or(0);
        if sensor_mask & bit == 0 {
            return Verdict::NotInMask;
        }

        // id 0 is never remembered as the sensor holding priority
        if self.last_id > 0
            && self.outranked_by_last(sender_id)
            && self.silent_for(now_ms) < self.policy.window_ms
        {
            return Verdict::Suppressed;
        }

        self.last_id = sender_id;
        self.last_heard_ms = now_ms;
        Verdict::Accepted
    }

    pub fn silent_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heard_ms)
    }

    fn outranked_by_last(&self, sender_id: u8) -> bool {
        match self.policy.priority {
            SensorPriority::LowerIdWins => sender_id > self.last_id,
            SensorPriority::HigherIdWins => sender_id < self.last_id,
        }
    }
}
