//! CLI command for batch extraction

use std::path::Path;
use std::time::Instant;

use crate::batch::{batch_extract, find_chm_files};
use crate::cli::progress::{Phase, entry_bar, print_batch_finished};

/// Batch extract CHM files
pub fn execute(source: &Path, dest: &Path) -> anyhow::Result<()> {
    let started = Instant::now();
    let files = find_chm_files(source);

    if files.is_empty() {
        println!("No CHM files found in: {}", source.display());
        return Ok(());
    }

    Phase::Batch.note(&format!("Extracting {} CHM files from {}", files.len(), source.display()));

    let pb = entry_bar(files.len() as u64, "files");
    let result = batch_extract(&files, source, dest, |progress| {
        pb.set_position(progress.current as u64);
        pb.set_message(progress.file.clone());
    });
    pb.finish_and_clear();

    for message in &result.results {
        println!("  {message}");
    }
    println!();
    print_batch_finished(result.success_count, files.len(), started.elapsed());

    if result.fail_count > 0 {
        anyhow::bail!("{} CHM files failed to extract", result.fail_count);
    }
    Ok(())
}
