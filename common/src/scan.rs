//! Cursor-advancing numeric scanners for the text protocol.
//!
//! Scanning never fails: a field with no digits reads as 0. After the digits
//! one delimiter character is consumed, so `20.37` scans as `20` and leaves
//! the cursor on `3`.

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        self.text.get(self.pos..).unwrap_or("")
    }

    /// True once only whitespace remains.
    pub fn is_exhausted(&self) -> bool {
        self.rest().trim_start().is_empty()
    }

    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Consumes a single ASCII digit if the cursor sits on one.
    pub fn digit(&mut self) -> Option<u8> {
        let byte = *self.rest().as_bytes().first()?;
        if byte.is_ascii_digit() {
            self.pos += 1;
            Some(byte - b'0')
        } else {
            None
        }
    }

    pub fn decimal(&mut self) -> i32 {
        self.skip_whitespace();
        let negative = match self.rest().as_bytes().first() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        let mut value: i64 = 0;
        while let Some(digit) = self.digit() {
            value = (value * 10 + i64::from(digit)).min(i64::from(i32::MAX));
        }
        self.skip_delimiter();

        let value = if negative { -value } else { value };
        i32::try_from(value).unwrap_or(i32::MAX)
    }

    pub fn hex(&mut self) -> u32 {
        self.skip_whitespace();
        let rest = self.rest().as_bytes();
        if rest.len() > 2 && rest[0] == b'0' && (rest[1] | 0x20) == b'x' && rest[2].is_ascii_hexdigit()
        {
            self.pos += 2;
        }

        let mut value: u32 = 0;
        while let Some(nibble) = self
            .rest()
            .as_bytes()
            .first()
            .and_then(|byte| char::from(*byte).to_digit(16))
        {
            value = value
                .checked_mul(16)
                .and_then(|shifted| shifted.checked_add(nibble))
                .unwrap_or(u32::MAX);
            self.pos += 1;
        }
        self.skip_delimiter();
        value
    }

    /// `None` when the field was omitted.
    pub fn decimal_field(&mut self) -> Option<i32> {
        if self.is_exhausted() {
            None
        } else {
            Some(self.decimal())
        }
    }

    pub fn hex_field(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            None
        } else {
            Some(self.hex())
        }
    }

    fn skip_delimiter(&mut self) {
        if let Some(ch) = self.rest().chars().next() {
            self.pos += ch.len_utf8();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_fields_stop_at_end_of_input() {
        let mut cursor = Cursor::new("400 410 ");

        assert_eq!(cursor.decimal_field(), Some(400));
        assert_eq!(cursor.decimal_field(), Some(410));
        assert_eq!(cursor.decimal_field(), None);
        assert_eq!(cursor.decimal_field(), None);
    }

    #[test]
    fn decimal_consumes_one_delimiter() {
        let mut cursor = Cursor::new("20.37");

        assert_eq!(cursor.decimal(), 20);
        assert_eq!(cursor.digit(), Some(3));
        assert_eq!(cursor.rest(), "7");
    }

    #[test]
    fn garbage_scans_as_zero_without_stalling() {
        let mut cursor = Cursor::new("abc");

        assert_eq!(cursor.decimal(), 0);
        assert_eq!(cursor.decimal(), 0);
        assert_eq!(cursor.decimal(), 0);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn hex_accepts_optional_prefix() {
        let mut cursor = Cursor::new("0x3E aa 300 0");

        assert_eq!(cursor.hex(), 0x3E);
        assert_eq!(cursor.hex(), 0xAA);
        assert_eq!(cursor.hex(), 0x300);
        assert_eq!(cursor.hex(), 0);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn oversized_hex_saturates() {
        let mut cursor = Cursor::new("100000000 FFFFFFFF 1");

        assert_eq!(cursor.hex(), u32::MAX);
        assert_eq!(cursor.hex(), u32::MAX);
        assert_eq!(cursor.hex(), 1);
    }

    #[test]
    fn signed_decimal() {
        let mut cursor = Cursor::new("-12 +7");

        assert_eq!(cursor.decimal(), -12);
        assert_eq!(cursor.decimal(), 7);
    }
}
