// src/riff/fourcc.rs

//! Four-character codes used as chunk and list-type identifiers.
//!
//! A `FourCC` stores the four ASCII bytes packed little-endian into a `u32`, so
//! writing the value as a little-endian integer reproduces the bytes exactly.

use crate::utils::error::{Result, RiffError};
use std::fmt;
use std::str::FromStr;

/// A four-character code. Equality is equality of the packed 32-bit value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FourCC(u32);

impl FourCC {
    /// The reserved "unset" code.
    pub const ZERO: FourCC = FourCC(0);

    pub const RIFF: FourCC = FourCC::from_bytes(*b"RIFF");
    pub const LIST: FourCC = FourCC::from_bytes(*b"LIST");

    /// Wraps a raw 32-bit value. Always succeeds.
    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        FourCC(value)
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        FourCC(u32::from_le_bytes(bytes))
    }

    /// Builds a code from a byte slice, which must hold exactly four bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
            RiffError::Format(format!(
                "a FourCC needs exactly 4 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(FourCC::from_bytes(bytes))
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for FourCC {
    type Err = RiffError;

    /// Parses exactly four ASCII characters.
    fn from_str(s: &str) -> Result<Self> {
        if !s.is_ascii() {
            return Err(RiffError::Format(format!(
                "FourCC '{}' contains non-ASCII characters",
                s
            )));
        }
        if s.len() != 4 {
            return Err(RiffError::Format(format!(
                "FourCC '{}' must be exactly 4 characters, got {}",
                s,
                s.len()
            )));
        }
        FourCC::from_slice(s.as_bytes())
    }
}

impl TryFrom<&str> for FourCC {
    type Error = RiffError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl TryFrom<&[u8]> for FourCC {
    type Error = RiffError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        FourCC::from_slice(bytes)
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC::from_bytes(bytes)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        FourCC(value)
    }
}

impl From<FourCC> for u32 {
    fn from(code: FourCC) -> Self {
        code.0
    }
}

impl From<FourCC> for [u8; 4] {
    fn from(code: FourCC) -> Self {
        code.to_bytes()
    }
}

impl fmt::Display for FourCC {
    /// Decodes the bytes one-to-one as characters; they need not be printable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self.to_bytes().iter().map(|&b| b as char).collect();
        f.write_str(&text)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        for s in ["RIFF", "WAVE", "fmt ", "cue ", "LIST"] {
            let code: FourCC = s.parse().unwrap();
            assert_eq!(code.to_string(), s);
        }
    }

    #[test]
    fn test_wrong_length_is_format_error() {
        assert!(matches!("fmt".parse::<FourCC>(), Err(RiffError::Format(_))));
        assert!(matches!("fmt  ".parse::<FourCC>(), Err(RiffError::Format(_))));
        assert!(matches!(
            FourCC::from_slice(&[1, 2, 3]),
            Err(RiffError::Format(_))
        ));
        assert!(matches!(
            FourCC::try_from(&b"ABCDE"[..]),
            Err(RiffError::Format(_))
        ));
    }

    #[test]
    fn test_non_ascii_is_rejected() {
        // Four bytes of UTF-8, but only two characters.
        assert!(matches!("éé".parse::<FourCC>(), Err(RiffError::Format(_))));
    }

    #[test]
    fn test_u32_is_little_endian_packing() {
        let code = FourCC::from_bytes(*b"RIFF");
        assert_eq!(code.as_u32(), 0x4646_4952);
        assert_eq!(FourCC::from_u32(0x4646_4952), code);
        assert_eq!(<[u8; 4]>::from(code), *b"RIFF");
        assert_eq!(code, FourCC::RIFF);
    }

    #[test]
    fn test_zero() {
        assert!(FourCC::ZERO.is_zero());
        assert!(FourCC::default().is_zero());
        assert_eq!(FourCC::ZERO.to_string(), "\0\0\0\0");
        assert!(!FourCC::LIST.is_zero());
    }
}
