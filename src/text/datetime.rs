//! `DateTime`/`TimeSpan` tick math (spec §4.3/§4.6). Ticks are CLR ticks:
//! 100-nanosecond units, `DateTime` counting from `0001-01-01T00:00:00`.
//! Calendar conversion uses Howard Hinnant's `civil_from_days`/
//! `days_from_civil` algorithm (proleptic Gregorian, no external calendar
//! crate), the same hand-rolled-math stance `timestamp.rs` takes for TAI/UTC
//! conversion.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_DAY: i64 = TICKS_PER_SECOND * 86_400;
const TICKS_MASK: u64 = (1u64 << 62) - 1;
/// Days from `0001-01-01` (the `DateTime` epoch) to `1970-01-01` (the epoch
/// Hinnant's formulas are anchored to).
const DAYS_0001_TO_UNIX_EPOCH: i64 = 719_162;

/// `DateTimeKind` (spec §4.3): whether a `DateTime`'s ticks are UTC, an
/// unqualified local time, or carry no timezone information at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateTimeKind {
    Unspecified,
    Utc,
    /// Decoded and re-encoded identically to `Unspecified`: the wire format
    /// carries no offset, and fabricating one is unsupported (spec §9).
    Local,
}

impl DateTimeKind {
    fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            0 => Ok(DateTimeKind::Unspecified),
            1 => Ok(DateTimeKind::Utc),
            2 => Ok(DateTimeKind::Local),
            _ => Err(Error::EncodeDomain {
                value: bits.to_string(),
                target_type: "DateTimeKind",
            }),
        }
    }

    fn to_bits(self) -> u64 {
        match self {
            DateTimeKind::Unspecified => 0,
            DateTimeKind::Utc => 1,
            DateTimeKind::Local => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime {
    pub ticks: i64,
    pub kind: DateTimeKind,
}

/// Hinnant's `civil_from_days`: map a day count relative to the Unix epoch to
/// a proleptic Gregorian `(year, month, day)`.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m as u32, d as u32)
}

/// The inverse of [`civil_from_days`].
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

impl DateTime {
    pub fn read(buf: &mut &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::TruncatedValue {
                kind: "DateTime",
                needed: 8,
                available: buf.len(),
            });
        }
        let raw = LittleEndian::read_u64(&buf[0..8]);
        *buf = &buf[8..];
        let ticks = (raw & TICKS_MASK) as i64;
        let kind = DateTimeKind::from_bits(raw >> 62)?;
        Ok(DateTime { ticks, kind })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let raw = (self.kind.to_bits() << 62) | (self.ticks as u64 & TICKS_MASK);
        out.extend_from_slice(&raw.to_le_bytes());
    }

    /// `(year, month, day, hour, minute, second, fractional_ticks)`, the
    /// calendar breakdown used by both rendering and parsing.
    fn to_civil(self) -> (i64, u32, u32, u32, u32, u32, u32) {
        let days = self.ticks.div_euclid(TICKS_PER_DAY);
        let time_ticks = self.ticks.rem_euclid(TICKS_PER_DAY);
        let (y, m, d) = civil_from_days(days - DAYS_0001_TO_UNIX_EPOCH);
        let secs = time_ticks / TICKS_PER_SECOND;
        let frac = (time_ticks % TICKS_PER_SECOND) as u32;
        let h = secs / 3600;
        let mi = (secs % 3600) / 60;
        let s = secs % 60;
        (y, m, d, h as u32, mi as u32, s as u32, frac)
    }

    /// ISO-8601 rendering: `Z` suffix for UTC, nothing for Unspecified or
    /// Local (see [`DateTimeKind::Local`]'s doc comment).
    pub fn to_iso8601(self) -> String {
        let (y, m, d, h, mi, s, frac) = self.to_civil();
        let mut out = format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}", y, m, d, h, mi, s);
        if frac != 0 {
            let digits = format!("{:07}", frac);
            let trimmed = digits.trim_end_matches('0');
            out.push('.');
            out.push_str(trimmed);
        }
        if matches!(self.kind, DateTimeKind::Utc) {
            out.push('Z');
        }
        out
    }

    /// Parse an ISO-8601 timestamp of the form this codec emits:
    /// `YYYY-MM-DDTHH:MM:SS[.fffffff][Z]`.
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::EncodeDomain {
            value: s.to_string(),
            target_type: "DateTime",
        };
        let (body, kind) = match s.strip_suffix('Z') {
            Some(rest) => (rest, DateTimeKind::Utc),
            None => (s, DateTimeKind::Unspecified),
        };
        let (date, time) = body.split_once('T').ok_or_else(bad)?;
        let date_parts: Vec<&str> = date.split('-').collect();
        if date_parts.len() != 3 {
            return Err(bad());
        }
        let y: i64 = date_parts[0].parse().map_err(|_| bad())?;
        let m: u32 = date_parts[1].parse().map_err(|_| bad())?;
        let d: u32 = date_parts[2].parse().map_err(|_| bad())?;
        let (time, frac_str) = match time.split_once('.') {
            Some((t, f)) => (t, f),
            None => (time, ""),
        };
        let time_parts: Vec<&str> = time.split(':').collect();
        if time_parts.len() != 3 {
            return Err(bad());
        }
        let h: i64 = time_parts[0].parse().map_err(|_| bad())?;
        let mi: i64 = time_parts[1].parse().map_err(|_| bad())?;
        let sec: i64 = time_parts[2].parse().map_err(|_| bad())?;
        if !(0..7).contains(&(frac_str.len() as i64)) {
            return Err(bad());
        }
        let frac_padded = format!("{:0<7}", frac_str);
        let frac: i64 = frac_padded.parse().map_err(|_| bad())?;

        let days = days_from_civil(y, m, d) + DAYS_0001_TO_UNIX_EPOCH;
        let ticks = days * TICKS_PER_DAY
            + h * 3600 * TICKS_PER_SECOND
            + mi * 60 * TICKS_PER_SECOND
            + sec * TICKS_PER_SECOND
            + frac;
        if ticks < 0 {
            return Err(bad());
        }
        Ok(DateTime { ticks, kind })
    }
}

/// `TimeSpan` (spec §4.3/§4.6): a signed tick count, rendered as an ISO-8601
/// duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSpan {
    pub ticks: i64,
}

impl TimeSpan {
    pub fn read(buf: &mut &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::TruncatedValue {
                kind: "TimeSpan",
                needed: 8,
                available: buf.len(),
            });
        }
        let ticks = LittleEndian::read_i64(&buf[0..8]);
        *buf = &buf[8..];
        Ok(TimeSpan { ticks })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ticks.to_le_bytes());
    }

    pub fn to_iso8601_duration(self) -> String {
        let negative = self.ticks < 0;
        let ticks_abs = self.ticks.unsigned_abs();
        let total_secs = ticks_abs / TICKS_PER_SECOND as u64;
        let frac = (ticks_abs % TICKS_PER_SECOND as u64) as u32;
        let days = total_secs / 86_400;
        let rem = total_secs % 86_400;
        let hours = rem / 3600;
        let minutes = (rem % 3600) / 60;
        let seconds = rem % 60;

        let mut out = String::from("P");
        if negative {
            out.insert(0, '-');
        }
        if days != 0 {
            out.push_str(&days.to_string());
            out.push('D');
        }
        let has_time = hours != 0 || minutes != 0 || seconds != 0 || frac != 0;
        if has_time {
            out.push('T');
            if hours != 0 {
                out.push_str(&hours.to_string());
                out.push('H');
            }
            if minutes != 0 {
                out.push_str(&minutes.to_string());
                out.push('M');
            }
            if seconds != 0 || frac != 0 {
                out.push_str(&seconds.to_string());
                if frac != 0 {
                    let digits = format!("{:07}", frac);
                    out.push('.');
                    out.push_str(digits.trim_end_matches('0'));
                }
                out.push('S');
            }
        }
        if days == 0 && !has_time {
            out.push_str("T0S");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example_max_datetime() {
        let dt = DateTime {
            ticks: 3_155_378_975_999_999_999,
            kind: DateTimeKind::Unspecified,
        };
        assert_eq!(dt.to_iso8601(), "9999-12-31T23:59:59.9999999");
    }

    #[test]
    fn worked_example_midnight_datetime() {
        let dt = DateTime {
            ticks: 632_834_208_000_000_000,
            kind: DateTimeKind::Unspecified,
        };
        assert_eq!(dt.to_iso8601(), "2006-05-17T00:00:00");
    }

    #[test]
    fn utc_kind_gets_z_suffix() {
        let dt = DateTime {
            ticks: 632_834_208_000_000_000,
            kind: DateTimeKind::Utc,
        };
        assert_eq!(dt.to_iso8601(), "2006-05-17T00:00:00Z");
    }

    #[test]
    fn local_kind_renders_like_unspecified() {
        let dt = DateTime {
            ticks: 632_834_208_000_000_000,
            kind: DateTimeKind::Local,
        };
        assert_eq!(dt.to_iso8601(), "2006-05-17T00:00:00");
    }

    #[test]
    fn parse_roundtrip() {
        let dt = DateTime::parse("9999-12-31T23:59:59.9999999").unwrap();
        assert_eq!(dt.ticks, 3_155_378_975_999_999_999);
        let dt = DateTime::parse("2006-05-17T00:00:00Z").unwrap();
        assert_eq!(dt.ticks, 632_834_208_000_000_000);
        assert_eq!(dt.kind, DateTimeKind::Utc);
    }

    #[test]
    fn read_write_roundtrip_preserves_kind_bits() {
        let dt = DateTime {
            ticks: 632_834_208_000_000_000,
            kind: DateTimeKind::Utc,
        };
        let mut buf = Vec::new();
        dt.write(&mut buf);
        let mut cursor = &buf[..];
        let decoded = DateTime::read(&mut cursor).unwrap();
        assert_eq!(decoded, dt);
    }

    #[test]
    fn timespan_zero_is_pt0s() {
        assert_eq!(TimeSpan { ticks: 0 }.to_iso8601_duration(), "PT0S");
    }

    #[test]
    fn timespan_days_and_time() {
        // 1 day, 2 hours, 3 minutes, 4 seconds.
        let ticks = TICKS_PER_DAY + 2 * 3600 * TICKS_PER_SECOND + 3 * 60 * TICKS_PER_SECOND + 4 * TICKS_PER_SECOND;
        assert_eq!(
            TimeSpan { ticks }.to_iso8601_duration(),
            "P1DT2H3M4S"
        );
    }

    #[test]
    fn timespan_negative_time_only() {
        let ticks = -(5 * TICKS_PER_SECOND);
        assert_eq!(TimeSpan { ticks }.to_iso8601_duration(), "-PT5S");
    }

    #[test]
    fn timespan_days_only_has_no_t() {
        let ticks = 3 * TICKS_PER_DAY;
        assert_eq!(TimeSpan { ticks }.to_iso8601_duration(), "P3D");
    }
}
