//! Directory entries and the PMGL chunk walk

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek};
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

use crate::container::ContainerId;
use crate::error::{Error, Result};
use crate::headers::{DirectoryChunk, ItsfHeader, ItspHeader, PmglHeader};
use crate::reader::ByteReader;

/// Classification of an entry by its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    /// Path ends with `/`.
    Directory,
    /// Any other `/`-rooted path.
    File,
    /// `/`-rooted path whose name starts with `#` or `$` (internal tables).
    SpecialFile,
    /// Path not rooted at `/`, such as `::DataSpace/NameList`.
    MetaData,
}

impl EntryKind {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with('/') {
            EntryKind::Directory
        } else if path.starts_with("/#") || path.starts_with("/$") {
            EntryKind::SpecialFile
        } else if path.starts_with('/') {
            EntryKind::File
        } else {
            EntryKind::MetaData
        }
    }

    /// The single-kind mask for this kind.
    pub fn mask(self) -> EntryKinds {
        match self {
            EntryKind::Directory => EntryKinds::DIRECTORY,
            EntryKind::File => EntryKinds::FILE,
            EntryKind::SpecialFile => EntryKinds::SPECIAL_FILE,
            EntryKind::MetaData => EntryKinds::METADATA,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Directory => "dir",
            EntryKind::File => "file",
            EntryKind::SpecialFile => "special",
            EntryKind::MetaData => "meta",
        };
        f.pad(name)
    }
}

/// Bit set of [`EntryKind`]s used to filter listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKinds(u8);

impl EntryKinds {
    pub const DIRECTORY: Self = Self(1);
    pub const FILE: Self = Self(2);
    pub const SPECIAL_FILE: Self = Self(4);
    pub const METADATA: Self = Self(8);
    pub const ALL: Self = Self(1 | 2 | 4 | 8);

    pub fn contains(self, kind: EntryKind) -> bool {
        self.0 & kind.mask().0 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Files and directories.
impl Default for EntryKinds {
    fn default() -> Self {
        Self::FILE | Self::DIRECTORY
    }
}

impl BitOr for EntryKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryKinds {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One directory record: a named byte range inside a data section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(skip)]
    container: ContainerId,
    path: String,
    section: u32,
    offset: u64,
    length: u64,
    kind: EntryKind,
}

impl Entry {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Index of the data section holding the entry's bytes.
    pub fn section(&self) -> u32 {
        self.section
    }

    /// Offset within the decompressed section.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The container this entry was read from.
    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_special_file(&self) -> bool {
        self.kind == EntryKind::SpecialFile
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == EntryKind::MetaData
    }

    fn read<R: Read + Seek>(
        reader: &mut ByteReader<R>,
        container: ContainerId,
        chunk: u32,
        end: u64,
    ) -> Result<Self> {
        let start = reader.position();
        let overrun = || Error::DirectoryEntryOverrun {
            chunk,
            offset: start,
            end,
        };

        let name_length = u64::from(reader.read_compressed_u32()?);
        if reader.position() + name_length > end {
            return Err(overrun());
        }
        let name = reader.read_bytes(name_length)?;
        let path = match String::from_utf8_lossy(&name) {
            Cow::Borrowed(path) => path.to_string(),
            Cow::Owned(path) => {
                tracing::warn!(
                    "Directory entry at offset {} in chunk {} is not valid UTF-8, read as {:?}",
                    start,
                    chunk,
                    path
                );
                path
            }
        };
        let section = reader.read_compressed_u32()?;
        let offset = u64::from(reader.read_compressed_u32()?);
        let length = u64::from(reader.read_compressed_u32()?);
        if reader.position() > end {
            return Err(overrun());
        }

        Ok(Self {
            container,
            kind: EntryKind::from_path(&path),
            path,
            section,
            offset,
            length,
        })
    }
}

/// Read every entry of the PMGL listing chunks, keyed by path.
///
/// Chunks are visited in order from `first_pmgl_chunk` to `last_pmgl_chunk`.
/// Index (PMGI) chunks in that range are skipped. A later entry with the
/// same path replaces an earlier one.
pub(crate) fn read_directory<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    itsf: &ItsfHeader,
    itsp: &ItspHeader,
    container: ContainerId,
) -> Result<BTreeMap<String, Entry>> {
    let mut entries = BTreeMap::new();
    if itsp.chunk_count == 0 {
        return Ok(entries);
    }
    let last = itsp.last_pmgl_chunk.min(itsp.chunk_count - 1);

    for number in itsp.first_pmgl_chunk..=last {
        let chunk_start = itsp.chunk_offset(itsf, number)?;
        reader.set_position(chunk_start)?;
        let header = match DirectoryChunk::read(reader)? {
            DirectoryChunk::Listing(header) => header,
            DirectoryChunk::Index(_) => {
                tracing::debug!("Skipping index chunk {}", number);
                continue;
            }
        };

        let end = listing_end(itsp, chunk_start, &header, number)?;
        let before = entries.len();
        while reader.position() < end {
            let entry = Entry::read(reader, container, number, end)?;
            if let Some(previous) = entries.insert(entry.path.clone(), entry) {
                tracing::warn!("Duplicate directory entry {:?} in chunk {}", previous.path, number);
            }
        }
        tracing::trace!(
            "Chunk {}: {} entries",
            number,
            entries.len() - before
        );
    }

    tracing::debug!("Read {} directory entries", entries.len());
    Ok(entries)
}

/// End of the entry area of a listing chunk.
fn listing_end(itsp: &ItspHeader, chunk_start: u64, header: &PmglHeader, chunk: u32) -> Result<u64> {
    let used = u64::from(itsp.chunk_size)
        .checked_sub(u64::from(header.free_space))
        .filter(|&used| used >= PmglHeader::SIZE)
        .ok_or(Error::DirectoryEntryOverrun {
            chunk,
            offset: chunk_start,
            end: chunk_start + u64::from(itsp.chunk_size),
        })?;
    Ok(chunk_start + used)
}
