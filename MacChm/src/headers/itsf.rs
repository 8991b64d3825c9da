//! ITSF file header

use std::io::{Read, Seek};

use serde::Serialize;

use super::{ITSF_SIGNATURE, expect_signature};
use crate::error::{Error, Result};
use crate::reader::{ByteReader, Guid};

/// Header lengths from this size up carry an explicit content offset.
const CONTENT_OFFSET_HEADER_LENGTH: u32 = 0x60;

/// The ITSF header at offset 0 of every container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItsfHeader {
    /// Format version, 2 or 3.
    pub version: u32,
    /// Declared header length in bytes.
    pub header_length: u32,
    pub timestamp: u32,
    /// Windows locale identifier.
    pub language_id: u32,
    pub directory_guid: Guid,
    pub stream_guid: Guid,
    /// Offset of the section table.
    pub section_offset: u64,
    /// Length of the section table.
    pub section_length: u64,
    /// Offset of the ITSP directory header.
    pub directory_offset: u64,
    /// Length of the directory (ITSP header plus all chunks).
    pub directory_length: u64,
    /// Offset that section 0 data is relative to.
    pub content_offset: u64,
}

impl ItsfHeader {
    /// Read the header from the start of the container.
    ///
    /// Also checks the file size recorded in the section table against the
    /// length of the source.
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        reader.set_position(0)?;
        expect_signature(reader, ITSF_SIGNATURE)?;

        let version = reader.read_u32()?;
        let header_length = reader.read_u32()?;
        if !(2..=3).contains(&version) {
            return Err(Error::UnsupportedVersion {
                header: "ITSF",
                version,
            });
        }

        let _unknown = reader.read_u32()?;
        let timestamp = reader.read_u32()?;
        let language_id = reader.read_u32()?;
        let directory_guid = reader.read_guid()?;
        let stream_guid = reader.read_guid()?;
        let section_offset = reader.read_u64()?;
        let section_length = reader.read_u64()?;
        let directory_offset = reader.read_u64()?;
        let directory_length = reader.read_u64()?;
        let content_offset = if header_length >= CONTENT_OFFSET_HEADER_LENGTH {
            reader.read_u64()?
        } else {
            directory_offset
                .checked_add(directory_length)
                .ok_or_else(|| {
                    Error::InvalidFormat(format!(
                        "directory at {directory_offset} with length {directory_length} overflows"
                    ))
                })?
        };

        tracing::debug!(
            "ITSF v{} header: directory at {} ({} bytes), content at {}",
            version,
            directory_offset,
            directory_length,
            content_offset
        );

        if section_length >= 16 {
            reader.set_position(section_offset)?;
            let _unknown1 = reader.read_u32()?;
            let _unknown2 = reader.read_u32()?;
            let total_length = reader.read_u64()?;
            if total_length != reader.len() {
                return Err(Error::SizeMismatch {
                    what: "file size",
                    expected: total_length,
                    actual: reader.len(),
                });
            }
        }

        Ok(Self {
            version,
            header_length,
            timestamp,
            language_id,
            directory_guid,
            stream_guid,
            section_offset,
            section_length,
            directory_offset,
            directory_length,
            content_offset,
        })
    }
}
