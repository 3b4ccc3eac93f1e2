// src/riff/stream.rs

//! Seekable stream helpers for RIFF parsing and serialisation.
//!
//! The codec never owns its stream. Callers open it, position it at a chunk
//! boundary and close it afterwards; this module only adds the little-endian
//! field accessors and the look-ahead operations the chunk engines need.

use crate::riff::fourcc::FourCC;
use crate::utils::error::{Result, RiffError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

/// Size of a chunk header: 4-byte ID plus 4-byte length.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// A readable, seekable stream usable as a trait object.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// A writable, seekable stream usable as a trait object.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// The 8-byte envelope in front of every chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: FourCC,
    /// Payload length, excluding the header and the pad byte.
    pub size: u32,
}

impl ChunkHeader {
    /// Bytes the chunk occupies in its parent: header, payload and pad byte.
    #[inline]
    pub fn footprint(&self) -> u64 {
        CHUNK_HEADER_SIZE + padded(self.size as u64)
    }
}

/// Rounds a payload length up to the next even number.
#[inline]
pub fn padded(size: u64) -> u64 {
    size + (size & 1)
}

/// Reading helpers shared by every chunk engine.
pub trait RiffReadExt: Read + Seek {
    fn read_fourcc(&mut self) -> Result<FourCC> {
        let mut id = [0u8; 4];
        self.read_exact(&mut id)?;
        Ok(FourCC::from_bytes(id))
    }

    /// Reads the length half of a chunk header whose ID the caller already consumed.
    fn read_chunk_size(&mut self) -> Result<u32> {
        Ok(self.read_u32::<LittleEndian>()?)
    }

    fn read_chunk_header(&mut self) -> Result<ChunkHeader> {
        let id = self.read_fourcc()?;
        let size = self.read_chunk_size()?;
        Ok(ChunkHeader { id, size })
    }

    /// Reads a FourCC without moving the stream position.
    fn peek_fourcc(&mut self) -> Result<FourCC> {
        self.peek_fourcc_at(0)
    }

    /// Reads the FourCC `ahead` bytes past the current position without
    /// moving the stream position.
    fn peek_fourcc_at(&mut self, ahead: u64) -> Result<FourCC> {
        let start = self.stream_position()?;
        self.seek(SeekFrom::Start(start + ahead))?;
        let peeked = self.read_fourcc();
        self.seek(SeekFrom::Start(start))?;
        peeked
    }

    /// Number of bytes between the current position and the end of the stream.
    fn bytes_left(&mut self) -> Result<u64> {
        let position = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(position))?;
        Ok(end.saturating_sub(position))
    }

    /// Moves forward `count` bytes, failing if the stream is shorter than that.
    fn skip_bytes(&mut self, count: u64) -> Result<()> {
        let left = self.bytes_left()?;
        if left < count {
            return Err(RiffError::MalformedStream(format!(
                "cannot skip {} bytes, only {} left in stream",
                count, left
            )));
        }
        self.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    /// Consumes a pad byte, which must be zero.
    fn read_pad_byte(&mut self) -> Result<()> {
        let pad = self.read_u8()?;
        if pad != 0 {
            return Err(RiffError::MalformedStream(format!(
                "pad byte must be 0x00, found 0x{:02X}",
                pad
            )));
        }
        Ok(())
    }
}

impl<T: Read + Seek + ?Sized> RiffReadExt for T {}

/// Writing helpers shared by every chunk engine.
pub trait RiffWriteExt: Write + Seek {
    fn write_fourcc(&mut self, id: FourCC) -> Result<()> {
        self.write_all(&id.to_bytes())?;
        Ok(())
    }

    fn write_chunk_header(&mut self, header: ChunkHeader) -> Result<()> {
        self.write_fourcc(header.id)?;
        self.write_u32::<LittleEndian>(header.size)?;
        Ok(())
    }

    fn write_pad_byte(&mut self) -> Result<()> {
        self.write_u8(0)?;
        Ok(())
    }
}

impl<T: Write + Seek + ?Sized> RiffWriteExt for T {}
