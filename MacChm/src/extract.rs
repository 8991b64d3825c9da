//! Writing container entries to disk

use std::fs;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use crate::container::Chm;
use crate::directory::{Entry, EntryKinds};
use crate::error::Result;

/// Progress of an extraction, reported once per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractProgress {
    /// 1-based index of the entry being written.
    pub current: usize,
    pub total: usize,
    /// Container path of the entry.
    pub path: String,
}

/// Summary of an extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written.
    pub files: usize,
    /// Bytes written.
    pub bytes: u64,
    /// Entries skipped because their path would leave the destination.
    pub skipped: Vec<String>,
}

/// Map a container path to a path below `destination`.
///
/// Returns `None` for paths with `..` components, which would escape the
/// destination directory.
pub fn output_path(destination: &Path, entry_path: &str) -> Option<PathBuf> {
    let mut out = destination.to_path_buf();
    for component in Path::new(entry_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Extract the file entries of `chm` accepted by `filter` into `destination`.
pub fn extract_entries<R, P, F, C>(
    chm: &Chm<R>,
    destination: P,
    mut filter: F,
    progress: C,
) -> Result<ExtractSummary>
where
    R: Read + Seek,
    P: AsRef<Path>,
    F: FnMut(&Entry) -> bool,
    C: Fn(&ExtractProgress),
{
    let destination = destination.as_ref();
    let entries: Vec<&Entry> = chm
        .entries(EntryKinds::FILE)
        .filter(|entry| filter(entry))
        .collect();
    let total = entries.len();
    let mut summary = ExtractSummary::default();

    for (index, entry) in entries.into_iter().enumerate() {
        progress(&ExtractProgress {
            current: index + 1,
            total,
            path: entry.path().to_string(),
        });

        let Some(target) = output_path(destination, entry.path()) else {
            tracing::warn!("Skipping entry outside the destination: {}", entry.path());
            summary.skipped.push(entry.path().to_string());
            continue;
        };
        let bytes = chm.entry_contents(entry)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &bytes)?;
        summary.files += 1;
        summary.bytes += bytes.len() as u64;
    }

    tracing::debug!(
        "Extracted {} files ({} bytes) to {}",
        summary.files,
        summary.bytes,
        destination.display()
    );
    Ok(summary)
}

/// Open `source` and extract all of its files into `destination`.
pub fn extract_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
) -> Result<ExtractSummary> {
    let chm = Chm::open(source)?;
    extract_entries(&chm, destination, |_| true, |_| {})
}

/// Open `source` and read one entry, failing with
/// [`Error::MissingEntry`](crate::Error::MissingEntry) when absent.
pub fn read_file_bytes<P: AsRef<Path>>(source: P, entry_path: &str) -> Result<Vec<u8>> {
    Chm::open(source)?.read_entry(entry_path)
}
