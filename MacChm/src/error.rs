//! Error types for `MacChm`

use thiserror::Error;

/// The error type for `MacChm` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from the underlying byte source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read would run past the end of the byte source.
    #[error("read after end of data: {requested} bytes at position {position} (length {length})")]
    UnexpectedEof {
        /// Position the read started at.
        position: u64,
        /// Number of bytes requested.
        requested: u64,
        /// Total length of the source.
        length: u64,
    },

    // ==================== Format Errors ====================
    /// A header signature did not match the expected one.
    ///
    /// Callers walking the directory use this to tell a PMGI index chunk
    /// apart from a PMGL leaf chunk.
    #[error("invalid header identifier: expecting '{expected}', found '{found}'")]
    UnexpectedHeader {
        /// The signature that was expected.
        expected: String,
        /// The signature actually found.
        found: String,
    },

    /// A versioned header carries a version number we cannot read.
    #[error("unsupported {header} version number: {version}")]
    UnsupportedVersion {
        /// Signature of the header.
        header: &'static str,
        /// The version found in the file.
        version: u32,
    },

    /// Two size records of the archive disagree.
    #[error("invalid {what}: expected {expected}, found {actual}")]
    SizeMismatch {
        /// What was being measured.
        what: &'static str,
        /// The declared size.
        expected: u64,
        /// The size actually found or computed.
        actual: u64,
    },

    /// Seek target lies outside the byte source.
    #[error("failed to seek to position {position} (length {length})")]
    SeekOutOfRange {
        /// Requested position.
        position: i64,
        /// Total length of the source.
        length: u64,
    },

    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    // ==================== Corrupt Data Errors ====================
    /// A directory entry runs past the used area of its chunk.
    #[error("directory entry at offset {offset} overruns chunk {chunk} (ends at {end})")]
    DirectoryEntryOverrun {
        /// Chunk number.
        chunk: u32,
        /// Offset the entry started at.
        offset: u64,
        /// End of the used area of the chunk.
        end: u64,
    },

    /// A Huffman code length table does not describe a valid code.
    #[error("Huffman table error: {0}")]
    HuffmanTable(String),

    /// LZX block header names a block type other than 1, 2 or 3.
    #[error("unexpected LZX block type {0}")]
    UnknownBlockType(u32),

    /// A decoded run would write past the end of the LZX window.
    #[error("LZX window overrun: {length} bytes at position {position} (window {window})")]
    WindowOverrun {
        /// Window cursor.
        position: usize,
        /// Run length.
        length: usize,
        /// Window size.
        window: usize,
    },

    /// Generic decompression/corruption error.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    // ==================== Lookup Errors ====================
    /// A required entry is missing from the directory.
    #[error("missing required entry: '{0}'")]
    MissingEntry(String),

    /// The name list declares a section we do not know how to read.
    #[error("unknown data section: {0}")]
    UnknownSection(String),

    /// An entry refers to a section index that does not exist.
    #[error("the CHM file does not contain a data section with index {0}")]
    MissingSection(u32),

    /// A cross-container reference names a container absent from the map.
    #[error("missing CHM reference from map: {0}")]
    MissingContainer(String),

    /// The container has no `.hhc`/`.hhk` sitemap of the requested kind.
    #[error("no sitemap of kind {0} in this CHM file")]
    NoSitemap(&'static str),

    // ==================== Sitemap Errors ====================
    /// XML/markup parsing error while reading a sitemap.
    #[error("sitemap markup error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Sitemap content is structurally invalid.
    #[error("invalid sitemap: {0}")]
    InvalidSitemap(String),
}

impl Error {
    /// Whether this error is a lookup failure (missing entry, section,
    /// container or sitemap).
    ///
    /// Optional features treat these as "absent" instead of propagating them.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Error::MissingEntry(_)
                | Error::UnknownSection(_)
                | Error::MissingSection(_)
                | Error::MissingContainer(_)
                | Error::NoSitemap(_)
        )
    }

    /// Whether this error reports corrupted compressed or directory data.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Error::DirectoryEntryOverrun { .. }
                | Error::HuffmanTable(_)
                | Error::UnknownBlockType(_)
                | Error::WindowOverrun { .. }
                | Error::CorruptData(_)
        )
    }
}

// Sitemap attribute parsing is lenient but still reports malformed markup
impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::InvalidSitemap(err.to_string())
    }
}

/// A specialized Result type for `MacChm` operations.
pub type Result<T> = std::result::Result<T, Error>;
