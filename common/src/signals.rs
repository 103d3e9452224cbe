//! Bit positions shared by the input status register and the output shift
//! register on the PCB.
//!
//! Six signals appear on both sides: X1, X2, Z1, Z2, ZX and W. Bit 0 is the R
//! wire (24VAC present) on input and the W fail-safe relay on output. Bit 7 is
//! output-only X3.

pub const BN_R: u8 = 0;
pub const BN_W_FAILSAFE: u8 = 0;
pub const BN_Z2: u8 = 1;
pub const BN_Z1: u8 = 2;
pub const BN_W: u8 = 3;
pub const BN_ZX: u8 = 4;
pub const BN_X2: u8 = 5;
pub const BN_X1: u8 = 6;
pub const BN_X3: u8 = 7;

pub const FIRST_SIGNAL_BIT: u8 = BN_Z2;
pub const LAST_SIGNAL_BIT: u8 = BN_X1;
pub const NUM_INPUT_SIGNALS: u8 = LAST_SIGNAL_BIT + 1 - FIRST_SIGNAL_BIT;
pub const NUM_INPUT_COMBINATIONS: usize = 1 << NUM_INPUT_SIGNALS;

pub const INPUT_SIGNAL_MASK: u8 = (1 << BN_Z2)
    | (1 << BN_Z1)
    | (1 << BN_W)
    | (1 << BN_ZX)
    | (1 << BN_X2)
    | (1 << BN_X1)
    | (1 << BN_R);

pub const OUTPUT_SIGNAL_MASK: u8 = (1 << BN_Z2)
    | (1 << BN_Z1)
    | (1 << BN_W)
    | (1 << BN_ZX)
    | (1 << BN_X2)
    | (1 << BN_X1)
    | (1 << BN_X3);

/// Index into an input map table for a raw input register value.
pub fn map_index(inputs: u8) -> usize {
    usize::from((inputs & INPUT_SIGNAL_MASK) >> FIRST_SIGNAL_BIT)
}
