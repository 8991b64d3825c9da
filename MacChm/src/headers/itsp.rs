//! ITSP directory header

use std::io::{Read, Seek};

use serde::Serialize;

use super::{ITSP_SIGNATURE, ItsfHeader, expect_signature};
use crate::error::{Error, Result};
use crate::reader::{ByteReader, Guid};

/// Header of the directory: chunk geometry and the PMGL chain bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItspHeader {
    pub version: u32,
    /// Declared header length; chunks start right after it.
    pub header_length: u32,
    /// Size of every directory chunk in bytes.
    pub chunk_size: u32,
    pub quick_ref_density: u32,
    /// Depth of the PMGI index tree (1 means no index chunks).
    pub index_depth: u32,
    /// Chunk number of the root PMGI chunk, -1 when there is none.
    pub root_index_chunk: i32,
    /// First PMGL listing chunk.
    pub first_pmgl_chunk: u32,
    /// Last PMGL listing chunk.
    pub last_pmgl_chunk: u32,
    /// Total number of directory chunks.
    pub chunk_count: u32,
    pub language_id: u32,
    pub system_guid: Guid,
}

impl ItspHeader {
    /// Read the directory header at `itsf.directory_offset`.
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>, itsf: &ItsfHeader) -> Result<Self> {
        reader.set_position(itsf.directory_offset)?;
        expect_signature(reader, ITSP_SIGNATURE)?;

        let version = reader.read_u32()?;
        let header_length = reader.read_u32()?;
        if version != 1 {
            return Err(Error::UnsupportedVersion {
                header: "ITSP",
                version,
            });
        }

        let _unknown = reader.read_u32()?;
        let chunk_size = reader.read_u32()?;
        let quick_ref_density = reader.read_u32()?;
        let index_depth = reader.read_u32()?;
        let root_index_chunk = reader.read_i32()?;
        let first_pmgl_chunk = reader.read_u32()?;
        let last_pmgl_chunk = reader.read_u32()?;
        let _unknown = reader.read_i32()?;
        let chunk_count = reader.read_u32()?;
        let language_id = reader.read_u32()?;
        let system_guid = reader.read_guid()?;
        // repeated header length, then three -1 fields
        let _length_again = reader.read_u32()?;
        for _ in 0..3 {
            let _unknown = reader.read_i32()?;
        }

        let expected = u64::from(header_length) + u64::from(chunk_count) * u64::from(chunk_size);
        if itsf.directory_length != expected {
            return Err(Error::SizeMismatch {
                what: "directory length",
                expected,
                actual: itsf.directory_length,
            });
        }
        if chunk_size == 0 && chunk_count > 0 {
            return Err(Error::InvalidFormat("directory chunk size is zero".to_string()));
        }

        tracing::debug!(
            "ITSP header: {} chunks of {} bytes, PMGL {}..={}, index depth {}",
            chunk_count,
            chunk_size,
            first_pmgl_chunk,
            last_pmgl_chunk,
            index_depth
        );

        Ok(Self {
            version,
            header_length,
            chunk_size,
            quick_ref_density,
            index_depth,
            root_index_chunk,
            first_pmgl_chunk,
            last_pmgl_chunk,
            chunk_count,
            language_id,
            system_guid,
        })
    }

    /// Absolute offset of chunk `number`.
    pub fn chunk_offset(&self, itsf: &ItsfHeader, number: u32) -> Result<u64> {
        u64::from(number)
            .checked_mul(u64::from(self.chunk_size))
            .and_then(|chunk| chunk.checked_add(u64::from(self.header_length)))
            .and_then(|relative| relative.checked_add(itsf.directory_offset))
            .ok_or_else(|| Error::InvalidFormat(format!("offset of directory chunk {number} overflows")))
    }
}
