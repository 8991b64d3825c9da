//! Data sections and the name list that declares them

mod mscompressed;

pub use mscompressed::MsCompressedSection;

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::Mutex;

use crate::directory::Entry;
use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// Reserved entry listing the data sections.
pub const NAME_LIST_PATH: &str = "::DataSpace/NameList";

pub(crate) const UNCOMPRESSED_NAME: &str = "Uncompressed";
pub(crate) const MSCOMPRESSED_NAME: &str = "MSCompressed";

/// A data section that entry byte ranges point into.
#[derive(Debug)]
pub enum Section {
    /// Stored bytes, addressed from the container's content offset.
    Uncompressed(UncompressedSection),
    /// LZX-compressed stream.
    MsCompressed(MsCompressedSection),
}

impl Section {
    pub fn name(&self) -> &'static str {
        match self {
            Section::Uncompressed(_) => UNCOMPRESSED_NAME,
            Section::MsCompressed(_) => MSCOMPRESSED_NAME,
        }
    }

    pub(crate) fn read<R: Read + Seek>(
        &self,
        source: &Mutex<ByteReader<R>>,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>> {
        match self {
            Section::Uncompressed(section) => section.read(source, offset, length),
            Section::MsCompressed(section) => section.read(source, offset, length),
        }
    }
}

/// Section whose entries are plain byte ranges of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UncompressedSection {
    base: u64,
}

impl UncompressedSection {
    pub(crate) fn new(base: u64) -> Self {
        Self { base }
    }

    /// Absolute file offset of section byte 0.
    pub fn base_offset(&self) -> u64 {
        self.base
    }

    pub(crate) fn read<R: Read + Seek>(
        &self,
        source: &Mutex<ByteReader<R>>,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>> {
        let position = self.base.checked_add(offset).ok_or_else(|| {
            Error::InvalidFormat(format!("section 0 offset {offset} overflows"))
        })?;
        let mut source = source.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        source.set_position(position)?;
        source.read_bytes(length)
    }
}

/// Parse the name list record into section names, in index order.
pub(crate) fn parse_name_list(bytes: Vec<u8>) -> Result<Vec<String>> {
    let mut reader = ByteReader::from_bytes(bytes);
    let _length = reader.read_u16()?;
    let count = reader.read_u16()?;
    if count == 0 {
        return Err(Error::InvalidFormat("no content section defined".to_string()));
    }

    let mut names = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let chars = reader.read_u16()?;
        let raw = reader.read_bytes(u64::from(chars) * 2)?;
        let _pad = reader.read_u16()?;
        let (name, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&raw);
        names.push(name.into_owned());
    }
    Ok(names)
}

/// Build the section table from the declared names.
///
/// Section 0 must be `Uncompressed`. `MSCompressed` sections load their
/// LZX parameters from reserved entries in section 0.
pub(crate) fn build_sections<R: Read + Seek>(
    names: &[String],
    section0: UncompressedSection,
    entries: &BTreeMap<String, Entry>,
    source: &Mutex<ByteReader<R>>,
    cache_capacity: Option<usize>,
) -> Result<Vec<Section>> {
    let mut sections = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let section = match (index, name.as_str()) {
            (_, UNCOMPRESSED_NAME) => Section::Uncompressed(section0),
            (0, MSCOMPRESSED_NAME) => {
                return Err(Error::InvalidFormat(
                    "first data section should be Uncompressed".to_string(),
                ));
            }
            (_, MSCOMPRESSED_NAME) => Section::MsCompressed(MsCompressedSection::load(
                section0,
                entries,
                source,
                cache_capacity,
            )?),
            (_, other) => return Err(Error::UnknownSection(other.to_string())),
        };
        tracing::debug!("Section {}: {}", index, section.name());
        sections.push(section);
    }
    Ok(sections)
}

/// Look up a reserved entry that must be stored in section 0.
pub(crate) fn required_section0_entry<'a>(
    entries: &'a BTreeMap<String, Entry>,
    path: &str,
) -> Result<&'a Entry> {
    let entry = entries
        .get(path)
        .ok_or_else(|| Error::MissingEntry(path.to_string()))?;
    if entry.section() != 0 {
        return Err(Error::InvalidFormat(format!(
            "the content of the entry '{path}' should be in section 0, but it's in section {}",
            entry.section()
        )));
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_list(names: &[&str]) -> Vec<u8> {
        let mut data = vec![0, 0];
        data.extend_from_slice(&(names.len() as u16).to_le_bytes());
        for name in names {
            let units: Vec<u16> = name.encode_utf16().collect();
            data.extend_from_slice(&(units.len() as u16).to_le_bytes());
            for unit in units {
                data.extend_from_slice(&unit.to_le_bytes());
            }
            data.extend_from_slice(&[0, 0]);
        }
        data
    }

    #[test]
    fn test_parse_name_list() {
        let names = parse_name_list(name_list(&["Uncompressed", "MSCompressed"])).unwrap();
        assert_eq!(names, vec!["Uncompressed", "MSCompressed"]);
    }

    #[test]
    fn test_empty_name_list() {
        assert!(matches!(
            parse_name_list(name_list(&[])),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_section_rules() {
        let entries = BTreeMap::new();
        let source = Mutex::new(ByteReader::from_bytes(Vec::new()));
        let section0 = UncompressedSection::new(0);

        let names = vec!["MSCompressed".to_string()];
        assert!(matches!(
            build_sections(&names, section0, &entries, &source, None),
            Err(Error::InvalidFormat(_))
        ));

        let names = vec!["Uncompressed".to_string(), "Zstd".to_string()];
        assert!(matches!(
            build_sections(&names, section0, &entries, &source, None),
            Err(Error::UnknownSection(ref name)) if name == "Zstd"
        ));

        // MSCompressed without its control data entry
        let names = vec!["Uncompressed".to_string(), "MSCompressed".to_string()];
        assert!(matches!(
            build_sections(&names, section0, &entries, &source, None),
            Err(Error::MissingEntry(_))
        ));
    }

    #[test]
    fn test_uncompressed_read() {
        let source = Mutex::new(ByteReader::from_bytes(b"....hello world".to_vec()));
        let section = UncompressedSection::new(4);
        assert_eq!(section.read(&source, 6, 5).unwrap(), b"world");
        assert!(section.read(&source, 6, 10).is_err());
    }
}
