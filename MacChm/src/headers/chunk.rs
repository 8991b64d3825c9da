//! PMGL (listing) and PMGI (index) directory chunk headers

use std::io::{Read, Seek};

use super::{PMGI_SIGNATURE, PMGL_SIGNATURE, check_signature, read_signature};
use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// Header of a listing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmglHeader {
    /// Unused bytes at the end of the chunk (entries plus quickref area).
    pub free_space: u32,
    /// Previous listing chunk, -1 for the first.
    pub previous_chunk: i32,
    /// Next listing chunk, -1 for the last.
    pub next_chunk: i32,
}

impl PmglHeader {
    /// Size of the header on disk.
    pub const SIZE: u64 = 20;

    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        check_signature(read_signature(reader)?, PMGL_SIGNATURE)?;
        Self::read_body(reader)
    }

    fn read_body<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        let free_space = reader.read_u32()?;
        let _unknown = reader.read_u32()?;
        let previous_chunk = reader.read_i32()?;
        let next_chunk = reader.read_i32()?;
        Ok(Self {
            free_space,
            previous_chunk,
            next_chunk,
        })
    }
}

/// Header of an index chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmgiHeader {
    pub free_space: u32,
}

impl PmgiHeader {
    pub const SIZE: u64 = 8;

    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        check_signature(read_signature(reader)?, PMGI_SIGNATURE)?;
        Self::read_body(reader)
    }

    fn read_body<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        Ok(Self {
            free_space: reader.read_u32()?,
        })
    }
}

/// A directory chunk, told apart by its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryChunk {
    Listing(PmglHeader),
    Index(PmgiHeader),
}

impl DirectoryChunk {
    /// Read whichever chunk header is at the cursor.
    pub fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<Self> {
        let signature = read_signature(reader)?;
        match signature {
            PMGL_SIGNATURE => Ok(DirectoryChunk::Listing(PmglHeader::read_body(reader)?)),
            PMGI_SIGNATURE => Ok(DirectoryChunk::Index(PmgiHeader::read_body(reader)?)),
            other => Err(Error::UnexpectedHeader {
                expected: "PMGL".to_string(),
                found: String::from_utf8_lossy(&other).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_chunk() {
        let mut data = b"PMGL".to_vec();
        data.extend_from_slice(&42u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&3i32.to_le_bytes());
        let chunk = DirectoryChunk::read(&mut ByteReader::from_bytes(data)).unwrap();
        assert_eq!(
            chunk,
            DirectoryChunk::Listing(PmglHeader {
                free_space: 42,
                previous_chunk: -1,
                next_chunk: 3
            })
        );
    }

    #[test]
    fn test_index_chunk_is_not_listing() {
        let mut data = b"PMGI".to_vec();
        data.extend_from_slice(&7u32.to_le_bytes());

        let mut reader = ByteReader::from_bytes(data.clone());
        assert!(matches!(
            PmglHeader::read(&mut reader),
            Err(Error::UnexpectedHeader { .. })
        ));

        let chunk = DirectoryChunk::read(&mut ByteReader::from_bytes(data)).unwrap();
        assert_eq!(chunk, DirectoryChunk::Index(PmgiHeader { free_space: 7 }));
    }
}
