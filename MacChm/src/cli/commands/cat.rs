//! CLI command for writing one entry to stdout

use std::io::Write;
use std::path::Path;

use crate::container::Chm;

pub fn execute(source: &Path, path: &str) -> anyhow::Result<()> {
    let chm = Chm::open(source)?;
    // Accept paths given without the leading slash
    let bytes = match chm.entry(path) {
        Some(entry) => chm.entry_contents(entry)?,
        None => chm.read_entry(&format!("/{}", path.trim_start_matches('/')))?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
