//! CLI command for listing CHM contents

use std::path::Path;

use crate::cli::filter::{format_size, matches_entry};
use crate::container::Chm;
use crate::directory::{Entry, EntryKinds};

pub fn execute(
    source: &Path,
    kinds: EntryKinds,
    detailed: bool,
    filter: Option<&str>,
    count: bool,
    json: bool,
) -> anyhow::Result<()> {
    let chm = Chm::open(source)?;

    let entries: Vec<&Entry> = chm
        .entries(kinds)
        .filter(|e| filter.is_none_or(|pattern| matches_entry(pattern, e.path())))
        .collect();

    if count {
        println!("{}", entries.len());
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if !detailed {
        for entry in &entries {
            println!("{}", entry.path());
        }
        return Ok(());
    }

    // Print header
    println!(
        "{:>10}  {:>7}  {:>10}  {:<7}  PATH",
        "SIZE", "SECTION", "OFFSET", "KIND"
    );

    for entry in &entries {
        println!(
            "{:>10}  {:>7}  {:>10}  {:<7}  {}",
            format_size(entry.length()),
            entry.section(),
            entry.offset(),
            entry.kind(),
            entry.path()
        );
    }

    let total: u64 = entries.iter().map(|e| e.length()).sum();
    let compressed = entries.iter().filter(|e| e.section() != 0).count();
    println!();
    println!(
        "{} entries, {} total ({} in compressed sections)",
        entries.len(),
        format_size(total),
        compressed
    );

    Ok(())
}
