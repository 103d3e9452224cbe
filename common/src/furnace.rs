use serde::Serialize;

/// One write to the output shift register, produced by the mode controllers
/// and executed by whoever owns the physical lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "mask", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputAction {
    Update(u8),
    Set(u8),
    Clear(u8),
}

pub trait Furnace {
    fn update_outputs(&mut self, mask: u8);
    fn set_output_bits(&mut self, mask: u8);
    fn clear_output_bits(&mut self, mask: u8);

    fn apply(&mut self, actions: &[OutputAction]) {
        for action in actions {
            match *action {
                OutputAction::Update(mask) => self.update_outputs(mask),
                OutputAction::Set(mask) => self.set_output_bits(mask),
                OutputAction::Clear(mask) => self.clear_output_bits(mask),
            }
        }
    }
}

/// In-memory output register. Used as the host's line state and as the
/// controller's own record of what it last drove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputLatch {
    mask: u8,
    writes: u32,
}

impl OutputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl Furnace for OutputLatch {
    fn update_outputs(&mut self, mask: u8) {
        self.mask = mask;
        self.writes = self.writes.saturating_add(1);
    }

    fn set_output_bits(&mut self, mask: u8) {
        self.update_outputs(self.mask | mask);
    }

    fn clear_output_bits(&mut self, mask: u8) {
        self.update_outputs(self.mask & !mask);
    }
}
