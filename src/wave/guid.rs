// src/wave/guid.rs

//! Sub-format identifiers for `WAVE_FORMAT_EXTENSIBLE`.

use crate::utils::error::Result;
use std::fmt;
use std::io::{Read, Write};

/// A 16-byte GUID in its on-disk (mixed-endian) byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const SIZE: u64 = 16;

    pub const ZERO: Guid = Guid([0; 16]);

    /// `KSDATAFORMAT_SUBTYPE_PCM`, 00000001-0000-0010-8000-00AA00389B71.
    pub const PCM: Guid = Guid::from_fields(
        0x0000_0001,
        0x0000,
        0x0010,
        [0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71],
    );

    /// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT`, 00000003-0000-0010-8000-00AA00389B71.
    pub const IEEE_FLOAT: Guid = Guid::from_fields(
        0x0000_0003,
        0x0000,
        0x0010,
        [0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71],
    );

    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    /// Builds a GUID from its textual fields; the first three are stored little-endian.
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        let d1 = data1.to_le_bytes();
        let d2 = data2.to_le_bytes();
        let d3 = data3.to_le_bytes();
        Guid([
            d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], data4[0], data4[1], data4[2],
            data4[3], data4[4], data4[5], data4[6], data4[7],
        ])
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; 16];
        reader.read_exact(&mut bytes)?;
        Ok(Guid(bytes))
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-",
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_le_bytes([b[4], b[5]]),
            u16::from_le_bytes([b[6], b[7]]),
            b[8],
            b[9]
        )?;
        for byte in &b[10..] {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// The set of sub-formats a validator accepts for extensible WAVE formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFormatRegistry {
    entries: Vec<(Guid, String)>,
}

impl SubFormatRegistry {
    /// A registry that recognises nothing.
    pub fn empty() -> Self {
        SubFormatRegistry {
            entries: Vec::new(),
        }
    }

    /// Adds (or renames) a recognised sub-format.
    pub fn register(&mut self, guid: Guid, name: impl Into<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(g, _)| *g == guid) {
            Some(entry) => entry.1 = name,
            None => self.entries.push((guid, name)),
        }
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.entries.iter().any(|(g, _)| g == guid)
    }

    pub fn name_of(&self, guid: &Guid) -> Option<&str> {
        self.entries
            .iter()
            .find(|(g, _)| g == guid)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SubFormatRegistry {
    fn default() -> Self {
        let mut registry = SubFormatRegistry::empty();
        registry.register(Guid::PCM, "PCM");
        registry.register(Guid::IEEE_FLOAT, "IEEE float");
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_byte_layout() {
        assert_eq!(
            Guid::PCM.as_bytes(),
            &[
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00,
                0x38, 0x9B, 0x71
            ]
        );
        assert_eq!(Guid::PCM.to_string(), "00000001-0000-0010-8000-00AA00389B71");
        assert_eq!(
            Guid::IEEE_FLOAT.to_string(),
            "00000003-0000-0010-8000-00AA00389B71"
        );
    }

    #[test]
    fn test_registry() {
        let mut registry = SubFormatRegistry::default();
        assert!(registry.contains(&Guid::PCM));
        assert!(registry.contains(&Guid::IEEE_FLOAT));
        assert!(!registry.contains(&Guid::ZERO));

        let custom = Guid::from_fields(0x6BA4_7B0A, 0x1234, 0x5678, [1, 2, 3, 4, 5, 6, 7, 8]);
        registry.register(custom, "vendor");
        registry.register(custom, "vendor v2");
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.name_of(&custom), Some("vendor v2"));
        assert!(SubFormatRegistry::empty().is_empty());
    }
}
