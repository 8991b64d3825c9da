//! Named set of opened containers for cross-container references

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use walkdir::WalkDir;

use crate::container::{Chm, OpenOptions};
use crate::error::Result;

/// Containers keyed by the name merge references use (`B.chm`).
///
/// Lookups try the exact name first, then an ASCII case-insensitive match,
/// since help authors are inconsistent about file name case.
pub struct ChmMap<R = BufReader<File>> {
    containers: HashMap<String, Chm<R>>,
}

impl<R> Default for ChmMap<R> {
    fn default() -> Self {
        Self {
            containers: HashMap::new(),
        }
    }
}

impl<R: Read + Seek> ChmMap<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, chm: Chm<R>) -> Option<Chm<R>> {
        self.containers.insert(name.into(), chm)
    }

    pub fn get(&self, name: &str) -> Option<&Chm<R>> {
        self.get_key_value(name).map(|(_, chm)| chm)
    }

    /// The stored name and container matching `name`.
    pub fn get_key_value(&self, name: &str) -> Option<(&str, &Chm<R>)> {
        self.containers
            .get_key_value(name)
            .or_else(|| {
                self.containers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
            })
            .map(|(key, chm)| (key.as_str(), chm))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_key_value(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Chm<R>> {
        self.containers.remove(name)
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.containers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl ChmMap<BufReader<File>> {
    /// Open every `.chm` file directly inside `dir`, keyed by file name.
    ///
    /// Files that fail to open are logged and skipped.
    pub fn open_dir<P: AsRef<Path>>(dir: P, options: &OpenOptions) -> Result<Self> {
        let mut map = Self::new();
        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            let is_chm = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("chm"));
            if !entry.file_type().is_file() || !is_chm {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match Chm::open_with(path, options) {
                Ok(chm) => {
                    map.insert(name, chm);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        tracing::debug!("Opened {} containers from {}", map.len(), dir.as_ref().display());
        Ok(map)
    }
}

impl<R> std::fmt::Debug for ChmMap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.containers.keys()).finish()
    }
}
