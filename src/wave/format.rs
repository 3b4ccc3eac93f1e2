// src/wave/format.rs

//! The `fmt ` record of a WAVE file.
//!
//! Three layouts share one type, selected by the declared record size:
//!
//! | size | layout                                                      |
//! |------|-------------------------------------------------------------|
//! | 16   | `WAVEFORMAT` + bits per sample (minimal PCM)                |
//! | 18   | `WAVEFORMATEX`: adds the extra-data size field              |
//! | 40   | `WAVEFORMATEXTENSIBLE`: adds valid bits, channel mask, GUID |
//!
//! Headers that are malformed but recoverable are normalised while reading
//! rather than rejected; `validate` reports what is still wrong afterwards.

use crate::utils::error::{Result, RiffError};
use crate::utils::validation::ValidationResult;
use crate::wave::guid::{Guid, SubFormatRegistry};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use std::io::{Read, Write};

/// `WAVE_FORMAT_*` tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Pcm,
    IeeeFloat,
    Extensible,
    /// Any tag this crate does not model, kept verbatim.
    Unknown(u16),
}

impl FormatTag {
    pub const PCM: u16 = 0x0001;
    pub const IEEE_FLOAT: u16 = 0x0003;
    pub const EXTENSIBLE: u16 = 0xFFFE;

    pub fn from_u16(value: u16) -> Self {
        match value {
            Self::PCM => FormatTag::Pcm,
            Self::IEEE_FLOAT => FormatTag::IeeeFloat,
            Self::EXTENSIBLE => FormatTag::Extensible,
            other => FormatTag::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            FormatTag::Pcm => Self::PCM,
            FormatTag::IeeeFloat => Self::IEEE_FLOAT,
            FormatTag::Extensible => Self::EXTENSIBLE,
            FormatTag::Unknown(value) => value,
        }
    }
}

impl Default for FormatTag {
    fn default() -> Self {
        FormatTag::Unknown(0)
    }
}

/// The fields `WAVEFORMATEXTENSIBLE` adds after the extra-data size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveFormatExtension {
    pub valid_bits_per_sample: u16,
    /// Speaker-position bitmask.
    pub channel_mask: u32,
    pub sub_format: Guid,
}

/// A WAVE format record in any of its three layouts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaveFormat {
    pub format_tag: FormatTag,
    pub channels: u16,
    pub samples_per_second: u32,
    pub average_bytes_per_second: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// `None` selects the minimal 16-byte layout.
    pub extra_data_size: Option<u16>,
    /// Present only for the 40-byte extensible layout.
    pub extension: Option<WaveFormatExtension>,
    /// Opaque bytes following the extra-data size for unmodelled format tags.
    pub extra_data: Vec<u8>,
}

impl WaveFormat {
    pub const BASE_SIZE: u64 = 16;
    pub const EX_SIZE: u64 = 18;
    pub const EXTENSIBLE_SIZE: u64 = 40;
    /// Value of `extra_data_size` for the extensible layout.
    pub const EXTENSION_SIZE: u16 = 22;

    /// A minimal 16-byte integer PCM record.
    pub fn pcm(channels: u16, samples_per_second: u32, bits_per_sample: u16) -> Self {
        let mut format = WaveFormat {
            format_tag: FormatTag::Pcm,
            channels,
            samples_per_second,
            bits_per_sample,
            ..WaveFormat::default()
        };
        format.recompute_derived();
        format
    }

    /// An 18-byte IEEE float record with a zero extra-data size.
    pub fn ieee_float(channels: u16, samples_per_second: u32, bits_per_sample: u16) -> Self {
        let mut format = WaveFormat {
            format_tag: FormatTag::IeeeFloat,
            channels,
            samples_per_second,
            bits_per_sample,
            extra_data_size: Some(0),
            ..WaveFormat::default()
        };
        format.recompute_derived();
        format
    }

    /// A 40-byte extensible record.
    pub fn extensible(
        channels: u16,
        samples_per_second: u32,
        bits_per_sample: u16,
        valid_bits_per_sample: u16,
        channel_mask: u32,
        sub_format: Guid,
    ) -> Self {
        let mut format = WaveFormat {
            format_tag: FormatTag::Extensible,
            channels,
            samples_per_second,
            bits_per_sample,
            extra_data_size: Some(Self::EXTENSION_SIZE),
            extension: Some(WaveFormatExtension {
                valid_bits_per_sample,
                channel_mask,
                sub_format,
            }),
            ..WaveFormat::default()
        };
        format.recompute_derived();
        format
    }

    fn frame_size(&self) -> u32 {
        self.channels as u32 * (self.bits_per_sample as u32).div_ceil(8)
    }

    /// Bytes per sample frame as implied by channels and bit depth, saturating
    /// at `u16::MAX` when the frame is too large for the field.
    pub fn derived_block_align(&self) -> u16 {
        u16::try_from(self.frame_size()).unwrap_or(u16::MAX)
    }

    pub fn derived_average_bytes_per_second(&self) -> u32 {
        self.samples_per_second
            .saturating_mul(self.derived_block_align() as u32)
    }

    /// Resets `block_align` and `average_bytes_per_second` from the other fields.
    pub fn recompute_derived(&mut self) {
        self.block_align = self.derived_block_align();
        self.average_bytes_per_second = self.derived_average_bytes_per_second();
    }

    /// Byte length of the record in its current layout.
    pub fn size(&self) -> u64 {
        match (&self.extension, self.extra_data_size) {
            (Some(_), _) => Self::EXTENSIBLE_SIZE,
            (None, Some(_)) => Self::EX_SIZE + self.extra_data.len() as u64,
            (None, None) => Self::BASE_SIZE,
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.format_tag == FormatTag::Extensible
    }

    /// The tag describing the samples: for extensible records this comes from
    /// the sub-format GUID when it is one of the standard ones.
    pub fn effective_tag(&self) -> FormatTag {
        match (&self.format_tag, &self.extension) {
            (FormatTag::Extensible, Some(ext)) if ext.sub_format == Guid::PCM => FormatTag::Pcm,
            (FormatTag::Extensible, Some(ext)) if ext.sub_format == Guid::IEEE_FLOAT => {
                FormatTag::IeeeFloat
            }
            (tag, _) => *tag,
        }
    }

    /// Number of whole sample frames in `data_len` bytes of sample data.
    pub fn sample_frames(&self, data_len: u64) -> u64 {
        match self.block_align {
            0 => 0,
            align => data_len / align as u64,
        }
    }

    /// Reads a record whose enclosing chunk declares `declared_size` bytes.
    ///
    /// The base fields come first. An extensible tag then pulls in the
    /// 22-byte extension; an extra-data size that disagrees with the tag is
    /// forced to 22 (extensible) or 0 (PCM, IEEE float). `average_bytes_per_second`
    /// and `block_align` are stored as read.
    pub fn read<R: Read + ?Sized>(reader: &mut R, declared_size: u64) -> Result<Self> {
        if declared_size < Self::BASE_SIZE {
            return Err(RiffError::RiffFormat(format!(
                "format record needs at least {} bytes, chunk declares {}",
                Self::BASE_SIZE,
                declared_size
            )));
        }

        let mut format = WaveFormat {
            format_tag: FormatTag::from_u16(reader.read_u16::<LittleEndian>()?),
            channels: reader.read_u16::<LittleEndian>()?,
            samples_per_second: reader.read_u32::<LittleEndian>()?,
            average_bytes_per_second: reader.read_u32::<LittleEndian>()?,
            block_align: reader.read_u16::<LittleEndian>()?,
            bits_per_sample: reader.read_u16::<LittleEndian>()?,
            ..WaveFormat::default()
        };

        if declared_size < Self::EX_SIZE {
            if format.is_extensible() {
                return Err(RiffError::RiffFormat(format!(
                    "extensible format record needs {} bytes, chunk declares {}",
                    Self::EXTENSIBLE_SIZE,
                    declared_size
                )));
            }
            return Ok(format);
        }

        let extra_data_size = reader.read_u16::<LittleEndian>()?;
        match format.format_tag {
            FormatTag::Extensible => {
                if declared_size < Self::EXTENSIBLE_SIZE {
                    return Err(RiffError::RiffFormat(format!(
                        "extensible format record needs {} bytes, chunk declares {}",
                        Self::EXTENSIBLE_SIZE,
                        declared_size
                    )));
                }
                if extra_data_size != Self::EXTENSION_SIZE {
                    warn!(
                        "extensible format declares {} extra bytes, treating as {}",
                        extra_data_size,
                        Self::EXTENSION_SIZE
                    );
                }
                format.extra_data_size = Some(Self::EXTENSION_SIZE);
                format.extension = Some(WaveFormatExtension {
                    valid_bits_per_sample: reader.read_u16::<LittleEndian>()?,
                    channel_mask: reader.read_u32::<LittleEndian>()?,
                    sub_format: Guid::read(reader)?,
                });
            }
            FormatTag::Pcm | FormatTag::IeeeFloat => {
                if extra_data_size != 0 {
                    warn!(
                        "{:?} format declares {} extra bytes, treating as 0",
                        format.format_tag, extra_data_size
                    );
                }
                format.extra_data_size = Some(0);
            }
            FormatTag::Unknown(tag) => {
                let available = declared_size - Self::EX_SIZE;
                let wanted = extra_data_size as u64;
                if wanted > available {
                    warn!(
                        "format 0x{:04X} declares {} extra bytes but only {} remain",
                        tag, wanted, available
                    );
                }
                let mut extra = vec![0u8; wanted.min(available) as usize];
                reader.read_exact(&mut extra)?;
                format.extra_data_size = Some(extra.len() as u16);
                format.extra_data = extra;
            }
        }
        Ok(format)
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.format_tag.to_u16())?;
        writer.write_u16::<LittleEndian>(self.channels)?;
        writer.write_u32::<LittleEndian>(self.samples_per_second)?;
        writer.write_u32::<LittleEndian>(self.average_bytes_per_second)?;
        writer.write_u16::<LittleEndian>(self.block_align)?;
        writer.write_u16::<LittleEndian>(self.bits_per_sample)?;
        match (&self.extension, self.extra_data_size) {
            (Some(ext), extra_data_size) => {
                writer.write_u16::<LittleEndian>(extra_data_size.unwrap_or(Self::EXTENSION_SIZE))?;
                writer.write_u16::<LittleEndian>(ext.valid_bits_per_sample)?;
                writer.write_u32::<LittleEndian>(ext.channel_mask)?;
                ext.sub_format.write(writer)?;
            }
            (None, Some(extra_data_size)) => {
                writer.write_u16::<LittleEndian>(extra_data_size)?;
                writer.write_all(&self.extra_data)?;
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Checks the record against the WAVE rules, accepting only the
    /// sub-formats in `sub_formats` for extensible records.
    pub fn validate(&self, sub_formats: &SubFormatRegistry) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if let FormatTag::Unknown(tag) = self.format_tag {
            result.fail(format!("FormatTag 0x{:04X} is not supported", tag));
        }
        result.require(self.channels >= 1, || "Channels is 0".to_string());
        result.require(self.samples_per_second > 0, || {
            "SamplesPerSecond is 0".to_string()
        });
        result.require(
            self.bits_per_sample > 0 && self.bits_per_sample % 8 == 0,
            || {
                format!(
                    "BitsPerSample {} is not a positive multiple of 8",
                    self.bits_per_sample
                )
            },
        );
        result.require(self.frame_size() <= u32::from(u16::MAX), || {
            format!(
                "Channels * BitsPerSample / 8 = {} does not fit in BlockAlign",
                self.frame_size()
            )
        });
        result.require(self.block_align == self.derived_block_align(), || {
            format!(
                "BlockAlign {} does not match Channels * BitsPerSample / 8 = {}",
                self.block_align,
                self.derived_block_align()
            )
        });
        result.require(
            self.average_bytes_per_second == self.derived_average_bytes_per_second(),
            || {
                format!(
                    "AverageBytesPerSecond {} does not match SamplesPerSecond * BlockAlign = {}",
                    self.average_bytes_per_second,
                    self.derived_average_bytes_per_second()
                )
            },
        );

        if let Some(extra) = self.extra_data_size {
            let known_tag = !matches!(self.format_tag, FormatTag::Unknown(_));
            result.require(!known_tag || extra == 0 || extra == Self::EXTENSION_SIZE, || {
                format!("ExtraDataSize {} is neither 0 nor 22", extra)
            });
        }

        match (self.is_extensible(), &self.extension) {
            (true, Some(ext)) => {
                result.require(self.extra_data_size == Some(Self::EXTENSION_SIZE), || {
                    "ExtraDataSize of an extensible format must be 22".to_string()
                });
                result.require(
                    ext.valid_bits_per_sample > 0
                        && ext.valid_bits_per_sample <= self.bits_per_sample,
                    || {
                        format!(
                            "ValidBitsPerSample {} is outside 1..={}",
                            ext.valid_bits_per_sample, self.bits_per_sample
                        )
                    },
                );
                result.require(ext.channel_mask != 0, || "ChannelMask is 0".to_string());
                match sub_formats.name_of(&ext.sub_format) {
                    Some(name) => debug!("extensible format carries the {} sub-format", name),
                    None => result.fail(format!(
                        "SubFormat {} is not a recognised sub-format",
                        ext.sub_format
                    )),
                }
            }
            (true, None) => result.fail("extensible format is missing its extension fields"),
            (false, Some(_)) => result.fail("extension fields present on a non-extensible format"),
            (false, None) => {}
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn extensible_blob(sub_format: Guid) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&0xFFFEu16.to_le_bytes());
        blob.extend_from_slice(&2u16.to_le_bytes());
        blob.extend_from_slice(&48_000u32.to_le_bytes());
        blob.extend_from_slice(&192_000u32.to_le_bytes());
        blob.extend_from_slice(&4u16.to_le_bytes());
        blob.extend_from_slice(&16u16.to_le_bytes());
        blob.extend_from_slice(&22u16.to_le_bytes());
        blob.extend_from_slice(&16u16.to_le_bytes());
        blob.extend_from_slice(&0x3u32.to_le_bytes());
        blob.extend_from_slice(sub_format.as_bytes());
        blob
    }

    #[test]
    fn test_pcm_derived_fields() {
        let format = WaveFormat::pcm(2, 44_100, 16);
        assert_eq!(format.block_align, 4);
        assert_eq!(format.average_bytes_per_second, 176_400);
        assert_eq!(format.size(), 16);
        assert!(format.validate(&SubFormatRegistry::default()).is_valid());

        let float = WaveFormat::ieee_float(1, 48_000, 32);
        assert_eq!(float.size(), 18);
        assert_eq!(float.block_align, 4);
    }

    #[test]
    fn test_minimal_layout_round_trip() {
        let format = WaveFormat::pcm(1, 8_000, 8);
        let mut bytes = Vec::new();
        format.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 16);

        let parsed = WaveFormat::read(&mut Cursor::new(&bytes), 16).unwrap();
        assert_eq!(parsed, format);
    }

    #[test]
    fn test_extensible_with_pcm_guid_is_valid() {
        let blob = extensible_blob(Guid::PCM);
        assert_eq!(blob.len(), 40);
        let format = WaveFormat::read(&mut Cursor::new(&blob), 40).unwrap();
        assert!(format.is_extensible());
        assert_eq!(format.size(), 40);
        assert_eq!(format.effective_tag(), FormatTag::Pcm);
        let result = format.validate(&SubFormatRegistry::default());
        assert!(result.is_valid(), "{}", result);

        let mut out = Vec::new();
        format.write(&mut out).unwrap();
        assert_eq!(out, blob);
    }

    #[test]
    fn test_extensible_with_zero_guid_is_invalid() {
        let blob = extensible_blob(Guid::ZERO);
        let format = WaveFormat::read(&mut Cursor::new(&blob), 40).unwrap();
        let result = format.validate(&SubFormatRegistry::default());
        assert!(!result.is_valid());
        assert!(result.reasons().iter().any(|r| r.contains("SubFormat")));
    }

    #[test]
    fn test_extensible_extra_size_is_forced_to_22() {
        let mut blob = extensible_blob(Guid::IEEE_FLOAT);
        blob[16] = 0;
        let format = WaveFormat::read(&mut Cursor::new(&blob), 40).unwrap();
        assert_eq!(format.extra_data_size, Some(22));
        assert_eq!(format.effective_tag(), FormatTag::IeeeFloat);
    }

    #[test]
    fn test_extensible_too_short_is_rejected() {
        let blob = extensible_blob(Guid::PCM);
        assert!(matches!(
            WaveFormat::read(&mut Cursor::new(&blob), 18),
            Err(RiffError::RiffFormat(_))
        ));
        assert!(matches!(
            WaveFormat::read(&mut Cursor::new(&blob), 12),
            Err(RiffError::RiffFormat(_))
        ));
    }

    #[test]
    fn test_pcm_nonzero_extra_size_is_normalised() {
        let mut bytes = Vec::new();
        WaveFormat::pcm(2, 44_100, 16).write(&mut bytes).unwrap();
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 4]);

        let mut cursor = Cursor::new(&bytes);
        let format = WaveFormat::read(&mut cursor, 22).unwrap();
        // The stray extra bytes are left for the caller to skip.
        assert_eq!(cursor.position(), 18);
        assert_eq!(format.extra_data_size, Some(0));
        assert!(format.extra_data.is_empty());
        assert_eq!(format.size(), 18);
        assert!(format.validate(&SubFormatRegistry::default()).is_valid());

        // Rewritten in the 18-byte layout with a zero extra size.
        let mut out = Vec::new();
        format.write(&mut out).unwrap();
        assert_eq!(out.len(), 18);
        assert_eq!(&out[..16], &bytes[..16]);
        assert_eq!(&out[16..], &[0, 0]);
    }

    #[test]
    fn test_oversized_frame_saturates_block_align() {
        let format = WaveFormat::pcm(u16::MAX, 8_000, 32);
        assert_eq!(format.derived_block_align(), u16::MAX);
        assert_eq!(format.block_align, u16::MAX);

        let result = format.validate(&SubFormatRegistry::default());
        assert!(!result.is_valid());
        let reasons = result.reasons().join("\n");
        assert!(reasons.contains("does not fit in BlockAlign"));
        assert!(!reasons.contains("does not match Channels"));
    }

    #[test]
    fn test_unknown_tag_keeps_extra_bytes() {
        let mut bytes = Vec::new();
        let mut adpcm = WaveFormat::pcm(1, 22_050, 8);
        adpcm.format_tag = FormatTag::Unknown(0x0002);
        adpcm.write(&mut bytes).unwrap();
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&[0xF4, 0x01]);

        let format = WaveFormat::read(&mut Cursor::new(&bytes), 20).unwrap();
        assert_eq!(format.extra_data, vec![0xF4, 0x01]);
        assert_eq!(format.size(), 20);

        let mut out = Vec::new();
        format.write(&mut out).unwrap();
        assert_eq!(out, bytes);

        let result = format.validate(&SubFormatRegistry::default());
        assert!(result.reasons().iter().any(|r| r.contains("FormatTag")));
    }

    #[test]
    fn test_validation_rules() {
        let mut format = WaveFormat::pcm(0, 0, 12);
        format.block_align = 9;
        let result = format.validate(&SubFormatRegistry::default());
        let reasons = result.reasons().join("\n");
        assert!(reasons.contains("Channels"));
        assert!(reasons.contains("SamplesPerSecond"));
        assert!(reasons.contains("BitsPerSample"));
        assert!(reasons.contains("BlockAlign"));

        let mut ext = WaveFormat::extensible(2, 48_000, 16, 24, 0, Guid::PCM);
        ext.extra_data_size = Some(5);
        let reasons = ext.validate(&SubFormatRegistry::default()).reasons().join("\n");
        assert!(reasons.contains("ValidBitsPerSample"));
        assert!(reasons.contains("ChannelMask"));
        assert!(reasons.contains("ExtraDataSize"));
    }
}
