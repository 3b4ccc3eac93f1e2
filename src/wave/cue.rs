// src/wave/cue.rs

//! Fixed-size records stored in `cue ` and `plst` chunks.

use crate::riff::fourcc::FourCC;
use crate::riff::stream::RiffReadExt;
use crate::utils::error::Result;
use crate::utils::validation::ValidationResult;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

/// One entry of a `cue ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CuePoint {
    pub cue_id: u32,
    /// Sample position in play order.
    pub play_order: u32,
    /// The chunk holding the cued sample, usually `data`.
    pub chunk_id: FourCC,
    pub chunk_start: u32,
    pub block_start: u32,
    pub sample_offset: u32,
}

impl CuePoint {
    pub const SIZE: u64 = 24;

    /// A cue at `sample_offset` into the `data` chunk.
    pub fn in_data(cue_id: u32, sample_offset: u32) -> Self {
        CuePoint {
            cue_id,
            play_order: sample_offset,
            chunk_id: FourCC::from_bytes(*b"data"),
            chunk_start: 0,
            block_start: 0,
            sample_offset,
        }
    }

    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(CuePoint {
            cue_id: reader.read_u32::<LittleEndian>()?,
            play_order: reader.read_u32::<LittleEndian>()?,
            chunk_id: reader.read_fourcc()?,
            chunk_start: reader.read_u32::<LittleEndian>()?,
            block_start: reader.read_u32::<LittleEndian>()?,
            sample_offset: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.cue_id)?;
        writer.write_u32::<LittleEndian>(self.play_order)?;
        writer.write_all(&self.chunk_id.to_bytes())?;
        writer.write_u32::<LittleEndian>(self.chunk_start)?;
        writer.write_u32::<LittleEndian>(self.block_start)?;
        writer.write_u32::<LittleEndian>(self.sample_offset)?;
        Ok(())
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::valid();
        result.require(!self.chunk_id.is_zero(), || {
            format!("cue point {} has no ChunkId", self.cue_id)
        });
        result
    }
}

/// One entry of a `plst` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaylistSegment {
    pub cue_id: u32,
    /// Segment length in samples.
    pub length: u32,
    pub loop_count: u32,
}

impl PlaylistSegment {
    pub const SIZE: u64 = 12;

    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(PlaylistSegment {
            cue_id: reader.read_u32::<LittleEndian>()?,
            length: reader.read_u32::<LittleEndian>()?,
            loop_count: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.cue_id)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u32::<LittleEndian>(self.loop_count)?;
        Ok(())
    }

    /// A segment must cover at least one sample and play at least once.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::valid();
        result.require(self.length > 0, || {
            format!("playlist segment for cue {} has Length 0", self.cue_id)
        });
        result.require(self.loop_count > 0, || {
            format!("playlist segment for cue {} has LoopCount 0", self.cue_id)
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_cue_point_layout() {
        let cue = CuePoint::in_data(7, 0x100);
        let mut cursor = Cursor::new(Vec::new());
        cue.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes.len() as u64, CuePoint::SIZE);
        assert_eq!(&bytes[0..4], &[7, 0, 0, 0]);
        assert_eq!(&bytes[8..12], b"data");
        assert_eq!(&bytes[20..24], &[0, 1, 0, 0]);

        let parsed = CuePoint::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, cue);
    }

    #[test]
    fn test_cue_point_requires_chunk_id() {
        assert!(CuePoint::in_data(1, 0).validate().is_valid());
        let orphan = CuePoint {
            cue_id: 3,
            ..CuePoint::default()
        };
        let result = orphan.validate();
        assert!(!result.is_valid());
        assert!(result.reasons()[0].contains("ChunkId"));
    }

    #[test]
    fn test_playlist_segment() {
        let bytes: [u8; 12] = [1, 0, 0, 0, 0x10, 0, 0, 0, 2, 0, 0, 0];
        let segment = PlaylistSegment::read(&mut &bytes[..]).unwrap();
        assert_eq!(
            segment,
            PlaylistSegment {
                cue_id: 1,
                length: 16,
                loop_count: 2
            }
        );
        assert!(segment.validate().is_valid());

        let mut out = Vec::new();
        segment.write(&mut out).unwrap();
        assert_eq!(out, bytes);

        let silent = PlaylistSegment {
            loop_count: 0,
            ..segment
        };
        assert!(!silent.validate().is_valid());
    }
}
