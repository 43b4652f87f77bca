//! .NET `Decimal` wire format (spec §4.3/§4.6): 16 bytes, `flags[4]` + `hi32`
//! + `lo64`, all little-endian. The 96-bit coefficient doesn't fit a 64-bit
//! integer but fits comfortably in a `u128`, so the "small bignum" the spec's
//! design note calls for is just `u128` — no external crate needed.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decimal {
    coefficient: u128,
    scale: u8,
    negative: bool,
}

impl Decimal {
    pub fn read(buf: &mut &[u8]) -> Result<Self> {
        if buf.len() < 16 {
            return Err(Error::TruncatedValue {
                kind: "Decimal",
                needed: 16,
                available: buf.len(),
            });
        }
        let flags = LittleEndian::read_u32(&buf[0..4]);
        let hi32 = LittleEndian::read_u32(&buf[4..8]);
        let lo64 = LittleEndian::read_u64(&buf[8..16]);
        *buf = &buf[16..];
        let scale = ((flags >> 16) & 0xFF) as u8;
        let negative = flags & 0x8000_0000 != 0;
        let coefficient = ((hi32 as u128) << 64) | lo64 as u128;
        Ok(Decimal {
            coefficient,
            scale,
            negative,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let flags = ((self.scale as u32) << 16) | if self.negative { 0x8000_0000 } else { 0 };
        let hi32 = (self.coefficient >> 64) as u32;
        let lo64 = self.coefficient as u64;
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&hi32.to_le_bytes());
        out.extend_from_slice(&lo64.to_le_bytes());
    }

    /// Exact decimal string: the coefficient's digits with the point shifted
    /// left by `scale`, padded with leading zeros, never trimmed within the
    /// scale's digit count.
    pub fn to_decimal_string(&self) -> String {
        let digits = self.coefficient.to_string();
        let scale = self.scale as usize;
        let mut body = if scale == 0 {
            digits
        } else {
            let digits = if digits.len() <= scale {
                format!("{:0>width$}", digits, width = scale + 1)
            } else {
                digits
            };
            let split = digits.len() - scale;
            format!("{}.{}", &digits[..split], &digits[split..])
        };
        if self.negative && self.coefficient != 0 {
            body.insert(0, '-');
        }
        body
    }

    /// Parse a decimal-looking lexical value (optional sign, digits,
    /// optional `.` and fractional digits) into wire form.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::EncodeDomain {
            value: s.to_string(),
            target_type: "Decimal",
        };
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(bad());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(bad());
        }
        let scale = frac_part.len();
        if scale > 28 {
            return Err(bad());
        }
        let combined = format!("{}{}", int_part, frac_part);
        let combined = if combined.is_empty() { "0" } else { &combined };
        let coefficient: u128 = combined.parse().map_err(|_| bad())?;
        Ok(Decimal {
            coefficient,
            scale: scale as u8,
            negative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(flags: u32, hi32: u32, lo64: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&hi32.to_le_bytes());
        out.extend_from_slice(&lo64.to_le_bytes());
        out
    }

    #[test]
    fn worked_example_positive() {
        let buf = bytes(0x0006_0000, 0, 5_123_456);
        let mut cursor = &buf[..];
        let d = Decimal::read(&mut cursor).unwrap();
        assert_eq!(d.to_decimal_string(), "5.123456");
    }

    #[test]
    fn worked_example_negative() {
        let buf = bytes(0x8006_0000, 0, 5_123_456);
        let mut cursor = &buf[..];
        let d = Decimal::read(&mut cursor).unwrap();
        assert_eq!(d.to_decimal_string(), "-5.123456");
    }

    #[test]
    fn worked_example_max_value() {
        let buf = bytes(0, 0xFFFF_FFFF, 0xFFFF_FFFF_FFFF_FFFF);
        let mut cursor = &buf[..];
        let d = Decimal::read(&mut cursor).unwrap();
        assert_eq!(d.to_decimal_string(), "79228162514264337593543950335");
    }

    #[test]
    fn roundtrip_parse_and_write() {
        let d = Decimal::parse("-5.123456").unwrap();
        let mut out = Vec::new();
        d.write(&mut out);
        assert_eq!(out, bytes(0x8006_0000, 0, 5_123_456));
        assert_eq!(d.to_decimal_string(), "-5.123456");
    }

    #[test]
    fn parse_integer_has_zero_scale() {
        let d = Decimal::parse("42").unwrap();
        assert_eq!(d.to_decimal_string(), "42");
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert!(Decimal::parse("abc").is_err());
        assert!(Decimal::parse("1.2.3").is_err());
    }
}
