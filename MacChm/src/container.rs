//! The opened CHM container

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::directory::{Entry, EntryKinds, read_directory};
use crate::error::{Error, Result};
use crate::headers::{ItsfHeader, ItspHeader};
use crate::reader::ByteReader;
use crate::section::{
    NAME_LIST_PATH, Section, UncompressedSection, build_sections, parse_name_list,
    required_section0_entry,
};
use crate::sitemap::{Sitemap, SitemapKind};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying the container an [`Entry`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContainerId(u64);

impl ContainerId {
    fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Options applied when opening a container.
///
/// # Example
///
/// ```no_run
/// use macchm::{Chm, OpenOptions};
///
/// let options = OpenOptions::new()
///     .with_cache_contents(true)
///     .with_block_cache_capacity(16);
/// let chm = Chm::open_with("manual.chm", &options)?;
/// # Ok::<(), macchm::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Keep the bytes of every entry read, keyed by path.
    pub cache_contents: bool,
    /// Number of decoded LZX block groups to keep. Defaults to the value
    /// derived from the container's control data.
    pub block_cache_capacity: Option<usize>,
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cache_contents(mut self, enabled: bool) -> Self {
        self.cache_contents = enabled;
        self
    }

    #[must_use]
    pub fn with_block_cache_capacity(mut self, capacity: usize) -> Self {
        self.block_cache_capacity = Some(capacity);
        self
    }
}

/// An opened CHM (ITSF) container.
///
/// Headers, the directory and the section table are read when the
/// container is opened. Entry contents are read on demand. All reads go
/// through `&self`, so a container can be shared between threads when its
/// byte source is `Send`.
pub struct Chm<R = BufReader<File>> {
    id: ContainerId,
    source: Mutex<ByteReader<R>>,
    itsf: ItsfHeader,
    itsp: ItspHeader,
    entries: BTreeMap<String, Entry>,
    sections: Vec<Section>,
    contents: Option<Mutex<HashMap<String, Arc<[u8]>>>>,
}

impl Chm<BufReader<File>> {
    /// Open a container file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening {}", path.display());
        let file = File::open(path)?;
        Self::from_reader_with(BufReader::new(file), options)
    }
}

impl Chm<Cursor<Vec<u8>>> {
    /// Open a container held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with(bytes, &OpenOptions::default())
    }

    pub fn from_bytes_with(bytes: Vec<u8>, options: &OpenOptions) -> Result<Self> {
        Self::from_reader_with(Cursor::new(bytes), options)
    }
}

impl<R: Read + Seek> Chm<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::from_reader_with(reader, &OpenOptions::default())
    }

    /// Open a container from any seekable byte source.
    pub fn from_reader_with(reader: R, options: &OpenOptions) -> Result<Self> {
        let id = ContainerId::next();
        let mut reader = ByteReader::new(reader)?;
        let itsf = ItsfHeader::read(&mut reader)?;
        let itsp = ItspHeader::read(&mut reader, &itsf)?;
        let entries = read_directory(&mut reader, &itsf, &itsp, id)?;
        let source = Mutex::new(reader);

        let section0 = UncompressedSection::new(itsf.content_offset);
        let name_list = required_section0_entry(&entries, NAME_LIST_PATH)?;
        let names = parse_name_list(section0.read(&source, name_list.offset(), name_list.length())?)?;
        let sections = build_sections(
            &names,
            section0,
            &entries,
            &source,
            options.block_cache_capacity,
        )?;

        Ok(Self {
            id,
            source,
            itsf,
            itsp,
            entries,
            sections,
            contents: options
                .cache_contents
                .then(|| Mutex::new(HashMap::new())),
        })
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn itsf(&self) -> &ItsfHeader {
        &self.itsf
    }

    pub fn itsp(&self) -> &ItspHeader {
        &self.itsp
    }

    /// Total length of the underlying byte source.
    pub fn len(&self) -> u64 {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries whose kind is in `kinds`, in path order.
    pub fn entries(&self, kinds: EntryKinds) -> impl Iterator<Item = &Entry> {
        self.entries
            .values()
            .filter(move |entry| kinds.contains(entry.kind()))
    }

    /// Number of entries of every kind.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Exact, case-sensitive path lookup.
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, index: u32) -> Option<&Section> {
        self.sections.get(index as usize)
    }

    /// Read the bytes of `entry`.
    pub fn entry_contents(&self, entry: &Entry) -> Result<Vec<u8>> {
        if entry.container() != self.id {
            return Err(Error::InvalidFormat(format!(
                "entry '{}' belongs to another container",
                entry.path()
            )));
        }

        if let Some(cache) = &self.contents {
            let cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(bytes) = cache.get(entry.path()) {
                return Ok(bytes.to_vec());
            }
        }

        let section = self
            .section(entry.section())
            .ok_or(Error::MissingSection(entry.section()))?;
        let bytes = section.read(&self.source, entry.offset(), entry.length())?;

        if let Some(cache) = &self.contents {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(entry.path().to_string(), Arc::from(bytes.as_slice()));
        }
        Ok(bytes)
    }

    /// Read the bytes of the entry at `path`.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(path)
            .ok_or_else(|| Error::MissingEntry(path.to_string()))?;
        self.entry_contents(entry)
    }

    /// First file entry whose path has the sitemap's extension.
    pub fn sitemap_entry(&self, kind: SitemapKind) -> Option<&Entry> {
        let extension = kind.extension();
        self.entries(EntryKinds::FILE).find(|entry| {
            let path = entry.path();
            path.len() >= extension.len()
                && path.is_char_boundary(path.len() - extension.len())
                && path[path.len() - extension.len()..].eq_ignore_ascii_case(extension)
        })
    }

    /// Parse the table of contents (`.hhc`), if the container has one.
    pub fn toc(&self) -> Result<Option<Sitemap>> {
        self.sitemap(SitemapKind::Toc)
    }

    /// Parse the keyword index (`.hhk`), if the container has one.
    pub fn index(&self) -> Result<Option<Sitemap>> {
        self.sitemap(SitemapKind::Index)
    }

    fn sitemap(&self, kind: SitemapKind) -> Result<Option<Sitemap>> {
        let Some(entry) = self.sitemap_entry(kind) else {
            return Ok(None);
        };
        let bytes = self.entry_contents(entry)?;
        Sitemap::parse(&bytes).map(Some)
    }
}

impl<R> std::fmt::Debug for Chm<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chm")
            .field("id", &self.id)
            .field("itsf", &self.itsf)
            .field("itsp", &self.itsp)
            .field("entries", &self.entries.len())
            .field("sections", &self.sections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_ids_are_unique() {
        let a = ContainerId::next();
        let b = ContainerId::next();
        assert_ne!(a, b);
        assert_ne!(a, ContainerId::default());
    }

    #[test]
    fn test_options_builder() {
        let options = OpenOptions::new()
            .with_cache_contents(true)
            .with_block_cache_capacity(3);
        assert!(options.cache_contents);
        assert_eq!(options.block_cache_capacity, Some(3));
        assert_eq!(OpenOptions::default().block_cache_capacity, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = Chm::from_bytes(b"not a chm file at all".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedHeader { .. }));
    }
}
