//! Batch CHM extraction
//!
//! Finds `.chm` files below a directory and extracts them in parallel,
//! one output folder per container.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::extract::extract_file;

/// Result of a batch extraction
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Number of containers extracted
    pub success_count: usize,
    /// Number of containers that failed
    pub fail_count: usize,
    /// One message per container processed
    pub results: Vec<String>,
}

/// Progress of a batch extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Containers started so far, including this one
    pub current: usize,
    pub total: usize,
    /// Container path relative to the source directory
    pub file: String,
}

/// Find all .chm files in a directory recursively
///
/// # Returns
/// A sorted list of paths to .chm files found in the directory tree.
pub fn find_chm_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut chm_files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("chm"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    chm_files.sort();
    chm_files
}

/// Batch extract CHM files in parallel
///
/// Each container is extracted into a folder named after the file (without
/// extension), below the same relative directory it had under
/// `source_base`.
pub fn batch_extract<F>(
    chm_files: &[PathBuf],
    source_base: &Path,
    dest_base: &Path,
    progress: F,
) -> BatchResult
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let total = chm_files.len();

    let results: Vec<String> = chm_files
        .par_iter()
        .map(|chm_path| {
            let relative_path = chm_path
                .strip_prefix(source_base)
                .unwrap_or(chm_path.as_path());
            let display_path = relative_path.to_string_lossy();

            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(&BatchProgress {
                current,
                total,
                file: display_path.to_string(),
            });

            let relative_parent = relative_path.parent().unwrap_or(Path::new(""));
            let stem = chm_path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let chm_dest = dest_base.join(relative_parent).join(&stem);

            match extract_file(chm_path, &chm_dest) {
                Ok(summary) => {
                    success_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Extracted: {display_path} ({} files)", summary.files)
                }
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!("Failed to extract {}: {}", display_path, e);
                    format!("Failed {display_path}: {e}")
                }
            }
        })
        .collect();

    BatchResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        results,
    }
}
