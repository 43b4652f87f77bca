//! GUID wire layout (spec §4.3, `UniqueId`/`Uuid`): 16 bytes, the first three
//! .NET `Guid` fields little-endian, the last two byte arrays verbatim — the
//! same mixed-endian layout as `Guid.ToByteArray()`.

use crate::error::{Error, Result};

/// A 128-bit GUID, held as its canonical four .NET fields rather than a flat
/// byte array, so formatting never has to re-derive the field boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub fn read(buf: &mut &[u8]) -> Result<Self> {
        if buf.len() < 16 {
            return Err(Error::TruncatedValue {
                kind: "Guid",
                needed: 16,
                available: buf.len(),
            });
        }
        let data1 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let data2 = u16::from_le_bytes(buf[4..6].try_into().unwrap());
        let data3 = u16::from_le_bytes(buf[6..8].try_into().unwrap());
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&buf[8..16]);
        *buf = &buf[16..];
        Ok(Guid { data1, data2, data3, data4 })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data1.to_le_bytes());
        out.extend_from_slice(&self.data2.to_le_bytes());
        out.extend_from_slice(&self.data3.to_le_bytes());
        out.extend_from_slice(&self.data4);
    }

    /// Canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` hyphenated form.
    pub fn to_hyphenated(self) -> String {
        format!(
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }

    /// Parse the canonical hyphenated form (optionally prefixed with
    /// `urn:uuid:`, which the caller should have already stripped).
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::EncodeDomain {
            value: s.to_string(),
            target_type: "Guid",
        };
        let s = s.trim();
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5
            || parts[0].len() != 8
            || parts[1].len() != 4
            || parts[2].len() != 4
            || parts[3].len() != 4
            || parts[4].len() != 12
        {
            return Err(bad());
        }
        let data1 = u32::from_str_radix(parts[0], 16).map_err(|_| bad())?;
        let data2 = u16::from_str_radix(parts[1], 16).map_err(|_| bad())?;
        let data3 = u16::from_str_radix(parts[2], 16).map_err(|_| bad())?;
        let tail = format!("{}{}", parts[3], parts[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
        }
        Ok(Guid { data1, data2, data3, data4 })
    }
}
