use crate::scan::Cursor;

/// One wireless thermometer packet, e.g. `C:1769, B:198, T:+20.58 R:45.46`.
/// Values are kept to tenths; further digits are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub temp_cx10: i16,
    pub humidity_x10: Option<u16>,
}

impl SensorReading {
    /// `None` when the packet carries no `T:` field.
    pub fn parse(text: &str) -> Option<Self> {
        let temp_cx10 = tenths_after(text, "T:")?;
        let humidity_x10 = tenths_after(text, "R:")
            .filter(|rh| *rh > 0)
            .map(|rh| u16::try_from(rh).unwrap_or(u16::MAX));

        Some(Self {
            temp_cx10: clamp_i16(temp_cx10),
            humidity_x10,
        })
    }
}

fn tenths_after(text: &str, flag: &str) -> Option<i32> {
    let start = text.find(flag)? + flag.len();
    let rest = &text[start..];
    let (negative, unsigned) = match rest.strip_prefix('-') {
        Some(unsigned) => (true, unsigned),
        None => (false, rest.strip_prefix('+').unwrap_or(rest)),
    };

    let mut cursor = Cursor::new(unsigned);
    let mut value = cursor.decimal().saturating_mul(10);
    if let Some(digit) = cursor.digit() {
        value = value.saturating_add(i32::from(digit));
    }
    Some(if negative { -value } else { value })
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
