// src/riff/leaf.rs

//! Leaf value components: the fixed- and variable-size fields that make up
//! chunk payloads. Leaves carry no header and are packed back to back inside
//! their chunk; padding is the chunk's business.

use crate::riff::component::ValidationContext;
use crate::riff::fourcc::FourCC;
use crate::riff::stream::{ReadSeek, RiffReadExt};
use crate::utils::error::{Result, RiffError};
use crate::utils::validation::ValidationResult;
use crate::wave::cue::{CuePoint, PlaylistSegment};
use crate::wave::format::WaveFormat;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::io::Write;

/// Which leaf to read next. Only kinds whose length is known up front, or
/// self-delimiting like text, can be read by kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    FourCC,
    Text,
    CuePoint,
    PlaylistSegment,
}

/// A single value stored in a chunk payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    FourCC(FourCC),
    /// Zero-terminated single-byte text; the terminator is not part of the value.
    Text(String),
    Bytes(Vec<u8>),
    CuePoint(CuePoint),
    PlaylistSegment(PlaylistSegment),
    WaveFormat(WaveFormat),
}

impl Leaf {
    /// Reads one value of the given kind, consuming exactly its encoded length.
    pub fn read(kind: LeafKind, stream: &mut dyn ReadSeek) -> Result<Leaf> {
        Ok(match kind {
            LeafKind::U8 => Leaf::U8(stream.read_u8()?),
            LeafKind::I8 => Leaf::I8(stream.read_i8()?),
            LeafKind::U16 => Leaf::U16(stream.read_u16::<LittleEndian>()?),
            LeafKind::I16 => Leaf::I16(stream.read_i16::<LittleEndian>()?),
            LeafKind::U32 => Leaf::U32(stream.read_u32::<LittleEndian>()?),
            LeafKind::I32 => Leaf::I32(stream.read_i32::<LittleEndian>()?),
            LeafKind::U64 => Leaf::U64(stream.read_u64::<LittleEndian>()?),
            LeafKind::I64 => Leaf::I64(stream.read_i64::<LittleEndian>()?),
            LeafKind::FourCC => Leaf::FourCC(stream.read_fourcc()?),
            LeafKind::Text => Leaf::read_text(stream, u64::MAX)?,
            LeafKind::CuePoint => Leaf::CuePoint(CuePoint::read(stream)?),
            LeafKind::PlaylistSegment => Leaf::PlaylistSegment(PlaylistSegment::read(stream)?),
        })
    }

    /// Reads text byte by byte up to and including the zero terminator, but
    /// never more than `limit` bytes. Text that hits the limit without a
    /// terminator is accepted as is.
    pub fn read_text(stream: &mut dyn ReadSeek, limit: u64) -> Result<Leaf> {
        let mut text = String::new();
        let mut consumed = 0u64;
        loop {
            if consumed == limit {
                warn!("text of {} bytes has no terminator", consumed);
                break;
            }
            let byte = stream.read_u8()?;
            consumed += 1;
            if byte == 0 {
                break;
            }
            text.push(byte as char);
        }
        Ok(Leaf::Text(text))
    }

    pub fn read_bytes(stream: &mut dyn ReadSeek, len: u64) -> Result<Leaf> {
        let left = stream.bytes_left()?;
        if len > left {
            return Err(RiffError::MalformedStream(format!(
                "expected {} bytes of data, only {} left in stream",
                len, left
            )));
        }
        let mut data = vec![0u8; len as usize];
        stream.read_exact(&mut data)?;
        Ok(Leaf::Bytes(data))
    }

    /// Encoded length in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Leaf::U8(_) | Leaf::I8(_) => 1,
            Leaf::U16(_) | Leaf::I16(_) => 2,
            Leaf::U32(_) | Leaf::I32(_) | Leaf::FourCC(_) => 4,
            Leaf::U64(_) | Leaf::I64(_) => 8,
            Leaf::Text(text) => text.chars().count() as u64 + 1,
            Leaf::Bytes(data) => data.len() as u64,
            Leaf::CuePoint(_) => CuePoint::SIZE,
            Leaf::PlaylistSegment(_) => PlaylistSegment::SIZE,
            Leaf::WaveFormat(format) => format.size(),
        }
    }

    pub fn write<W: Write + ?Sized>(&self, stream: &mut W) -> Result<()> {
        match self {
            Leaf::U8(v) => stream.write_u8(*v)?,
            Leaf::I8(v) => stream.write_i8(*v)?,
            Leaf::U16(v) => stream.write_u16::<LittleEndian>(*v)?,
            Leaf::I16(v) => stream.write_i16::<LittleEndian>(*v)?,
            Leaf::U32(v) => stream.write_u32::<LittleEndian>(*v)?,
            Leaf::I32(v) => stream.write_i32::<LittleEndian>(*v)?,
            Leaf::U64(v) => stream.write_u64::<LittleEndian>(*v)?,
            Leaf::I64(v) => stream.write_i64::<LittleEndian>(*v)?,
            Leaf::FourCC(id) => stream.write_all(&id.to_bytes())?,
            Leaf::Text(text) => {
                let mut bytes = Vec::with_capacity(text.len() + 1);
                for c in text.chars() {
                    let byte = u8::try_from(c).map_err(|_| {
                        RiffError::Format(format!(
                            "character {:?} cannot be stored as single-byte text",
                            c
                        ))
                    })?;
                    bytes.push(byte);
                }
                bytes.push(0);
                stream.write_all(&bytes)?;
            }
            Leaf::Bytes(data) => stream.write_all(data)?,
            Leaf::CuePoint(cue) => cue.write(stream)?,
            Leaf::PlaylistSegment(segment) => segment.write(stream)?,
            Leaf::WaveFormat(format) => format.write(stream)?,
        }
        Ok(())
    }

    pub fn validate(&self, context: &ValidationContext) -> ValidationResult {
        match self {
            Leaf::Text(text) => {
                let mut result = ValidationResult::valid();
                result.require(!text.is_empty(), || "text is empty".to_string());
                result.require(!text.contains('\0'), || {
                    format!("text {:?} contains an embedded terminator", text)
                });
                if !text.is_ascii() {
                    result.mark_unknown(format!("text {:?} is not plain ASCII", text));
                }
                result
            }
            Leaf::FourCC(id) => {
                let mut result = ValidationResult::valid();
                result.require(!id.is_zero(), || "FourCC value is unset".to_string());
                result
            }
            Leaf::CuePoint(cue) => cue.validate(),
            Leaf::PlaylistSegment(segment) => segment.validate(),
            Leaf::WaveFormat(format) => format.validate(&context.sub_formats),
            _ => ValidationResult::valid(),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Leaf::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Leaf::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Leaf::Bytes(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_wave_format(&self) -> Option<&WaveFormat> {
        match self {
            Leaf::WaveFormat(format) => Some(format),
            _ => None,
        }
    }

    pub fn as_cue_point(&self) -> Option<&CuePoint> {
        match self {
            Leaf::CuePoint(cue) => Some(cue),
            _ => None,
        }
    }

    pub fn as_playlist_segment(&self) -> Option<&PlaylistSegment> {
        match self {
            Leaf::PlaylistSegment(segment) => Some(segment),
            _ => None,
        }
    }
}
