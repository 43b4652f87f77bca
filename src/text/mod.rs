//! Typed text-value codecs (spec §4.3): one `(read, write)` pair per
//! [`crate::record::TextKind`], independent of record framing. Integer and
//! float cases follow `element.rs`'s byteorder-driven read/write; the
//! composite formats (decimal, datetime, guid) live in their own submodules.

pub mod decimal;
pub mod datetime;
pub mod guid;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};

use crate::dictionary::Dictionaries;
use crate::error::{Error, Result};
use crate::record::{letter_for_index, TextKind};
use crate::varint;

pub use decimal::Decimal;
pub use datetime::{DateTime, DateTimeKind, TimeSpan};
pub use guid::Guid;

/// Which fixed-width length prefix a `Chars`/`Bytes`/`UnicodeChars` family
/// uses: the family's `8`/`16`/`32` names the bit-width of its own length
/// field, not the length of the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LenWidth {
    W8,
    W16,
    W32,
}

fn read_len(buf: &mut &[u8], width: LenWidth) -> Result<usize> {
    let (needed, len) = match width {
        LenWidth::W8 => (
            1,
            *buf.first().ok_or(Error::TruncatedValue {
                kind: "length prefix",
                needed: 1,
                available: 0,
            })? as usize,
        ),
        LenWidth::W16 => {
            if buf.len() < 2 {
                return Err(Error::TruncatedValue {
                    kind: "length prefix",
                    needed: 2,
                    available: buf.len(),
                });
            }
            (2, LittleEndian::read_u16(&buf[0..2]) as usize)
        }
        LenWidth::W32 => {
            if buf.len() < 4 {
                return Err(Error::TruncatedValue {
                    kind: "length prefix",
                    needed: 4,
                    available: buf.len(),
                });
            }
            (4, LittleEndian::read_u32(&buf[0..4]) as usize)
        }
    };
    *buf = &buf[needed..];
    Ok(len)
}

fn write_len(out: &mut Vec<u8>, width: LenWidth, len: usize) {
    match width {
        LenWidth::W8 => out.push(len as u8),
        LenWidth::W16 => out.extend_from_slice(&(len as u16).to_le_bytes()),
        LenWidth::W32 => out.extend_from_slice(&(len as u32).to_le_bytes()),
    }
}

fn take<'a>(buf: &mut &'a [u8], n: usize, kind: &'static str) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(Error::TruncatedValue {
            kind,
            needed: n,
            available: buf.len(),
        });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn format_float(value: f64, negative_zero: bool) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INF".to_string()
        } else {
            "-INF".to_string()
        }
    } else if value == 0.0 && negative_zero {
        "-0".to_string()
    } else {
        value.to_string()
    }
}

/// Single-precision counterpart of [`format_float`]: formats the `f32`
/// directly so the shortest round-tripping decimal is taken relative to the
/// record's actual 32-bit value, not its lossless widening to `f64` (whose
/// shortest round-trip is almost always a longer, spurious-looking decimal).
fn format_float32(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INF".to_string()
        } else {
            "-INF".to_string()
        }
    } else if value == 0.0 && value.is_sign_negative() {
        "-0".to_string()
    } else {
        value.to_string()
    }
}

/// Decode the value of every typed-text kind that carries data of its own.
/// `StartList`/`EndList` carry no payload and are handled by the decoder's
/// list-grouping state instead of here.
pub fn read_value(kind: TextKind, buf: &mut &[u8], dicts: &Dictionaries) -> Result<String> {
    use TextKind::*;
    Ok(match kind {
        Zero => "0".to_string(),
        One => "1".to_string(),
        False => "false".to_string(),
        True => "true".to_string(),
        Int8 => (take(buf, 1, "Int8")?[0] as i8).to_string(),
        Int16 => LittleEndian::read_i16(take(buf, 2, "Int16")?).to_string(),
        Int32 => LittleEndian::read_i32(take(buf, 4, "Int32")?).to_string(),
        Int64 => LittleEndian::read_i64(take(buf, 8, "Int64")?).to_string(),
        Float => {
            let bits = LittleEndian::read_u32(take(buf, 4, "Float")?);
            format_float32(f32::from_bits(bits))
        }
        Double => {
            let bits = LittleEndian::read_u64(take(buf, 8, "Double")?);
            let v = f64::from_bits(bits);
            format_float(v, v.is_sign_negative() && v == 0.0)
        }
        Decimal => Decimal::read(buf)?.to_decimal_string(),
        DateTime => datetime::DateTime::read(buf)?.to_iso8601(),
        Chars8 => read_chars(buf, LenWidth::W8)?,
        Chars16 => read_chars(buf, LenWidth::W16)?,
        Chars32 => read_chars(buf, LenWidth::W32)?,
        Bytes8 => read_bytes_base64(buf, LenWidth::W8)?,
        Bytes16 => read_bytes_base64(buf, LenWidth::W16)?,
        Bytes32 => read_bytes_base64(buf, LenWidth::W32)?,
        StartList | EndList => {
            return Err(Error::UnexpectedRecordCode {
                code: 0,
                position: 0,
            })
        }
        Empty => String::new(),
        Dictionary => {
            let key = varint::read_u32(buf)?;
            dicts.lookup(key)?.to_string()
        }
        UniqueId => format!("urn:uuid:{}", Guid::read(buf)?.to_hyphenated()),
        TimeSpan => TimeSpan::read(buf)?.to_iso8601_duration(),
        Uuid => Guid::read(buf)?.to_hyphenated(),
        UInt64 => LittleEndian::read_u64(take(buf, 8, "UInt64")?).to_string(),
        Bool => {
            if take(buf, 1, "Bool")?[0] != 0 {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        UnicodeChars8 => read_unicode_chars(buf, LenWidth::W8)?,
        UnicodeChars16 => read_unicode_chars(buf, LenWidth::W16)?,
        UnicodeChars32 => read_unicode_chars(buf, LenWidth::W32)?,
        QNameDictionary => {
            let prefix_index = take(buf, 1, "QNameDictionaryText")?[0];
            if prefix_index > 25 {
                return Err(Error::InvalidPrefixIndex(prefix_index));
            }
            let key = varint::read_u32(buf)?;
            format!("{}:{}", letter_for_index(prefix_index), dicts.lookup(key)?)
        }
    })
}

fn read_chars(buf: &mut &[u8], width: LenWidth) -> Result<String> {
    let len = read_len(buf, width)?;
    let bytes = take(buf, len, "CharsText")?;
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn read_bytes_base64(buf: &mut &[u8], width: LenWidth) -> Result<String> {
    let len = read_len(buf, width)?;
    let bytes = take(buf, len, "BytesText")?;
    Ok(BASE64.encode(bytes))
}

fn read_unicode_chars(buf: &mut &[u8], width: LenWidth) -> Result<String> {
    let len = read_len(buf, width)?;
    let bytes = take(buf, len, "UnicodeCharsText")?;
    if bytes.len() % 2 != 0 {
        return Err(Error::InvalidUtf16);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::InvalidUtf16)
}

pub fn write_int8(out: &mut Vec<u8>, value: i8) {
    out.push(value as u8);
}

pub fn write_int16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_int32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_int64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_uint64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_float(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_bits().to_le_bytes());
}

pub fn write_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_bits().to_le_bytes());
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(value as u8);
}

pub fn write_chars(out: &mut Vec<u8>, s: &str, width: LenWidth) {
    write_len(out, width, s.len());
    out.extend_from_slice(s.as_bytes());
}

pub fn write_bytes(out: &mut Vec<u8>, data: &[u8], width: LenWidth) {
    write_len(out, width, data.len());
    out.extend_from_slice(data);
}

pub fn write_unicode_chars(out: &mut Vec<u8>, s: &str, width: LenWidth) {
    let units: Vec<u16> = s.encode_utf16().collect();
    write_len(out, width, units.len() * 2);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

pub fn write_dictionary_key(out: &mut Vec<u8>, key: u32) {
    varint::write_u32(out, key);
}

pub fn write_qname(out: &mut Vec<u8>, prefix_index: u8, key: u32) {
    out.push(prefix_index);
    varint::write_u32(out, key);
}

/// Decode standard-alphabet base64 text (encoder-side: text content being
/// encoded as `BytesN`).
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    BASE64.decode(s).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionaries;

    #[test]
    fn chars8_worked_example() {
        let buf = [0x05u8, b'h', b'e', b'l', b'l', b'o'];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::Chars8, &mut cursor, &dicts).unwrap(),
            "hello"
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn chars16_worked_example() {
        let buf = [0x05u8, 0x00, b'h', b'e', b'l', b'l', b'o'];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::Chars16, &mut cursor, &dicts).unwrap(),
            "hello"
        );
    }

    #[test]
    fn bytes8_worked_example() {
        let buf = [0x08u8, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::Bytes8, &mut cursor, &dicts).unwrap(),
            "AAECAwQFBgc="
        );
    }

    #[test]
    fn unicode_chars8_chinese_worked_example() {
        let buf = [0x08u8, 0x91, 0x4E, 0x62, 0x88, 0x2D, 0x4E, 0x66, 0x5B];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::UnicodeChars8, &mut cursor, &dicts).unwrap(),
            "云衢中学"
        );
    }

    #[test]
    fn qname_dictionary_worked_example() {
        let buf = [0x08u8, 0x8E, 0x07];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfs(1000);
        assert_eq!(
            read_value(TextKind::QNameDictionary, &mut cursor, &dicts).unwrap(),
            "i:str910"
        );
    }

    #[test]
    fn qname_dictionary_rejects_out_of_range_prefix_index() {
        let buf = [26u8, 0x8E, 0x07];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfs(1000);
        assert!(matches!(
            read_value(TextKind::QNameDictionary, &mut cursor, &dicts),
            Err(Error::InvalidPrefixIndex(26))
        ));

        let buf = [255u8, 0x8E, 0x07];
        let mut cursor = &buf[..];
        assert!(matches!(
            read_value(TextKind::QNameDictionary, &mut cursor, &dicts),
            Err(Error::InvalidPrefixIndex(255))
        ));
    }

    #[test]
    fn uniqueid_worked_example() {
        let buf = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::UniqueId, &mut cursor, &dicts).unwrap(),
            "urn:uuid:33221100-5544-7766-8899-aabbccddeeff"
        );
    }

    #[test]
    fn timespan_worked_example_negative() {
        let buf: [u8; 8] = [0x00, 0xC4, 0xF5, 0x32, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        let rendered = read_value(TextKind::TimeSpan, &mut cursor, &dicts).unwrap();
        assert_eq!(rendered, "-PT5M44S");
    }

    #[test]
    fn timespan_worked_example_positive() {
        let buf: [u8; 8] = [0x00, 0xB0, 0x8E, 0xF0, 0x1B, 0x00, 0x00, 0x00];
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        let rendered = read_value(TextKind::TimeSpan, &mut cursor, &dicts).unwrap();
        assert_eq!(rendered, "PT3H20M");
    }

    #[test]
    fn float_specials() {
        let mut buf = f32::INFINITY.to_le_bytes();
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::Float, &mut cursor, &dicts).unwrap(),
            "INF"
        );
        buf = f32::NEG_INFINITY.to_le_bytes();
        cursor = &buf[..];
        assert_eq!(
            read_value(TextKind::Float, &mut cursor, &dicts).unwrap(),
            "-INF"
        );
        buf = f32::NAN.to_le_bytes();
        cursor = &buf[..];
        assert_eq!(
            read_value(TextKind::Float, &mut cursor, &dicts).unwrap(),
            "NaN"
        );
        buf = (-0.0f32).to_le_bytes();
        cursor = &buf[..];
        assert_eq!(
            read_value(TextKind::Float, &mut cursor, &dicts).unwrap(),
            "-0"
        );
    }

    #[test]
    fn uint64_max() {
        let buf = 18_446_744_073_709_551_615u64.to_le_bytes();
        let mut cursor = &buf[..];
        let dicts = Dictionaries::nbfx();
        assert_eq!(
            read_value(TextKind::UInt64, &mut cursor, &dicts).unwrap(),
            "18446744073709551615"
        );
    }
}
