//! LZX control data and reset table of the `MSCompressed` section

use std::io::{Read, Seek};

use serde::Serialize;

use super::{LZXC_SIGNATURE, expect_signature};
use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// Window sizes are stored in units of 32 KiB.
const WINDOW_UNIT: u64 = 0x8000;

/// LZXC control data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LzxcHeader {
    pub version: u32,
    /// Frames between decoder resets.
    pub reset_interval: u32,
    /// Window size in bytes.
    pub window_size: u64,
    /// Cache size hint; the block cache holds `(1 + cache_size) << 2` groups.
    pub cache_size: u32,
}

impl LzxcHeader {
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        let size = reader.read_u32()?;
        if size < 6 {
            return Err(Error::InvalidFormat(format!(
                "LZXC control data too short ({size} dwords)"
            )));
        }
        expect_signature(reader, LZXC_SIGNATURE)?;
        let version = reader.read_u32()?;
        if version != 2 {
            return Err(Error::UnsupportedVersion {
                header: "LZXC",
                version,
            });
        }
        let reset_interval = reader.read_u32()?;
        let window_size = u64::from(reader.read_u32()?) * WINDOW_UNIT;
        let cache_size = reader.read_u32()?;
        if reset_interval == 0 {
            return Err(Error::InvalidFormat("LZXC reset interval is zero".to_string()));
        }
        Ok(Self {
            version,
            reset_interval,
            window_size,
            cache_size,
        })
    }

    /// Default number of reset-interval groups kept decoded.
    pub fn default_cache_capacity(&self) -> usize {
        (1 + self.cache_size as usize) << 2
    }
}

/// Reset table: where each frame's compressed data starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTable {
    pub version: u32,
    /// Size of the decompressed section.
    pub uncompressed_length: u64,
    /// Size of the compressed stream.
    pub compressed_length: u64,
    /// Decompressed bytes per frame.
    pub block_size: u64,
    /// Compressed offset of every frame, relative to the content entry.
    pub addresses: Vec<u64>,
}

impl ResetTable {
    const ENTRY_SIZE: u32 = 8;
    const HEADER_LENGTH: u32 = 0x28;

    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        let version = reader.read_u32()?;
        if version != 2 {
            return Err(Error::UnsupportedVersion {
                header: "reset table",
                version,
            });
        }
        let entry_count = reader.read_u32()?;
        let entry_size = reader.read_u32()?;
        if entry_size != Self::ENTRY_SIZE {
            return Err(Error::SizeMismatch {
                what: "reset table entry size",
                expected: u64::from(Self::ENTRY_SIZE),
                actual: u64::from(entry_size),
            });
        }
        let header_length = reader.read_u32()?;
        if header_length != Self::HEADER_LENGTH {
            return Err(Error::SizeMismatch {
                what: "reset table header length",
                expected: u64::from(Self::HEADER_LENGTH),
                actual: u64::from(header_length),
            });
        }
        let uncompressed_length = reader.read_u64()?;
        let compressed_length = reader.read_u64()?;
        let block_size = reader.read_u64()?;
        if block_size == 0 {
            return Err(Error::InvalidFormat("reset table block size is zero".to_string()));
        }

        reader.set_position(u64::from(header_length))?;
        let addresses = (0..entry_count)
            .map(|_| reader.read_u64())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version,
            uncompressed_length,
            compressed_length,
            block_size,
            addresses,
        })
    }

    /// Compressed byte range of block `index`.
    pub fn block_range(&self, index: usize) -> Result<(u64, u64)> {
        let start = *self.addresses.get(index).ok_or_else(|| {
            Error::CorruptData(format!("read after last data block ({index})"))
        })?;
        let end = self
            .addresses
            .get(index + 1)
            .copied()
            .unwrap_or(self.compressed_length);
        if end < start {
            return Err(Error::CorruptData(format!(
                "reset table address {end} precedes {start}"
            )));
        }
        Ok((start, end))
    }

    /// Decompressed length of block `index`; the last one may be short.
    pub fn block_length(&self, index: usize) -> u64 {
        let start = (index as u64).saturating_mul(self.block_size);
        self.uncompressed_length
            .saturating_sub(start)
            .min(self.block_size)
    }
}
