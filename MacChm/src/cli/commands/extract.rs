//! CLI command for CHM extraction

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::cli::filter::matches_entry;
use crate::cli::progress::{Phase, entry_bar, print_extracted};
use crate::container::Chm;
use crate::error::Error;
use crate::extract::{extract_entries, output_path};

pub fn execute(
    source: &Path,
    destination: &Path,
    filter: Option<&str>,
    file: Option<&str>,
    progress: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    if progress {
        Phase::ReadDirectory.announce(1, 2, &format!("Reading directory of {}", source.display()));
    }
    let chm = Chm::open(source).with_context(|| format!("opening {}", source.display()))?;

    // Single file extraction
    if let Some(file_path) = file {
        let entry = chm
            .entry(file_path)
            .ok_or_else(|| Error::MissingEntry(file_path.to_string()))?;
        let target = output_path(destination, entry.path())
            .with_context(|| format!("refusing to write {file_path} outside the destination"))?;
        let bytes = chm.entry_contents(entry)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        println!("Extracted {file_path} to {}", target.display());
        return Ok(());
    }

    let matching = chm
        .entries(crate::EntryKinds::FILE)
        .filter(|e| filter.is_none_or(|pattern| matches_entry(pattern, e.path())))
        .count();
    if matching == 0 {
        match filter {
            Some(pattern) => println!("No files match pattern: {pattern}"),
            None => println!("No files to extract"),
        }
        return Ok(());
    }

    let pb = progress.then(|| {
        Phase::Inflate.announce(2, 2, &format!("Inflating {matching} topics"));
        entry_bar(matching as u64, "topics")
    });

    let summary = extract_entries(
        &chm,
        destination,
        |e| filter.is_none_or(|pattern| matches_entry(pattern, e.path())),
        |p| {
            if let Some(pb) = &pb {
                pb.set_position(p.current as u64);
                pb.set_message(p.path.clone());
            }
        },
    )?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    for skipped in &summary.skipped {
        println!("Skipped unsafe path: {skipped}");
    }
    if progress {
        print_extracted(summary.files, summary.bytes, started.elapsed());
    } else {
        println!(
            "Extracted {} files ({} bytes) to {}",
            summary.files,
            summary.bytes,
            destination.display()
        );
    }

    Ok(())
}
