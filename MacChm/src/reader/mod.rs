//! Positioned little-endian readers over the container bytes
//!
//! [`ByteReader`] is used for headers, directory chunks and raw section
//! reads. [`BitReader`] feeds the LZX decoder.

mod bits;

pub use bits::BitReader;

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A 16-byte Windows GUID as stored in ITSF/ITSP headers.
///
/// Renders as `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` with the first three
/// groups taken little-endian, the way Windows prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(Uuid);

impl Guid {
    /// Build a GUID from its on-disk byte layout.
    #[must_use]
    pub fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }

    /// The underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.braced())
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Byte source with an explicit cursor and known total length.
///
/// Every read checks the remaining length first, so a short source is
/// reported as [`Error::UnexpectedEof`] with the position that failed
/// rather than a bare I/O error.
pub struct ByteReader<R> {
    inner: R,
    position: u64,
    length: u64,
}

impl ByteReader<Cursor<Vec<u8>>> {
    /// Wrap an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len() as u64;
        Self {
            inner: Cursor::new(bytes),
            position: 0,
            length,
        }
    }
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wrap a seekable source, measuring its length.
    pub fn new(mut inner: R) -> Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            position: 0,
            length,
        })
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left between the cursor and the end of the source.
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Move the cursor to an absolute position.
    ///
    /// Positioning exactly at the end is allowed; anything past it is an error.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::SeekOutOfRange {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                length: self.length,
            });
        }
        self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Move the cursor relative to its current position.
    pub fn skip(&mut self, delta: i64) -> Result<()> {
        let target = i64::try_from(self.position)
            .ok()
            .and_then(|position| position.checked_add(delta))
            .ok_or_else(|| {
                Error::InvalidFormat(format!("skip of {delta} bytes from {} overflows", self.position))
            })?;
        let target = u64::try_from(target).map_err(|_| Error::SeekOutOfRange {
            position: target,
            length: self.length,
        })?;
        self.set_position(target)
    }

    fn ensure_available(&self, requested: u64) -> Result<()> {
        if requested > self.remaining() {
            return Err(Error::UnexpectedEof {
                position: self.position,
                requested,
                length: self.length,
            });
        }
        Ok(())
    }

    /// Read exactly `count` raw bytes.
    pub fn read_bytes(&mut self, count: u64) -> Result<Vec<u8>> {
        self.ensure_available(count)?;
        let mut buf = vec![0u8; usize::try_from(count).map_err(|_| {
            Error::InvalidFormat(format!("read of {count} bytes does not fit in memory"))
        })?];
        self.inner.read_exact(&mut buf)?;
        self.position += count;
        Ok(buf)
    }

    /// Read a fixed-size array of raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure_available(N as u64)?;
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.position += N as u64;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_available(1)?;
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure_available(2)?;
        let value = self.inner.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure_available(4)?;
        let value = self.inner.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure_available(4)?;
        let value = self.inner.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure_available(8)?;
        let value = self.inner.read_u64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    /// Read a 16-byte GUID.
    pub fn read_guid(&mut self) -> Result<Guid> {
        Ok(Guid::from_bytes_le(self.read_array::<16>()?))
    }

    /// Read a directory-style variable-length integer.
    ///
    /// Big-endian groups of 7 bits; a set high bit means another byte follows.
    pub fn read_compressed_u32(&mut self) -> Result<u32> {
        let start = self.position;
        let mut value: u64 = 0;
        loop {
            let byte = self.read_u8()?;
            value = (value << 7) | u64::from(byte & 0x7f);
            if value > u64::from(u32::MAX) {
                return Err(Error::CorruptData(format!(
                    "variable-length integer at {start} overflows 32 bits"
                )));
            }
            if byte < 0x80 {
                return Ok(value as u32);
            }
        }
    }
}

impl<R> fmt::Debug for ByteReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteReader")
            .field("position", &self.position)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}
