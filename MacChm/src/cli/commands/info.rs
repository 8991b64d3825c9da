//! CLI command for showing CHM headers and layout

use std::path::Path;

use serde_json::json;

use crate::cli::filter::format_size;
use crate::container::Chm;
use crate::directory::{EntryKind, EntryKinds};
use crate::section::Section;
use crate::sitemap::SitemapKind;

pub fn execute(source: &Path, json: bool) -> anyhow::Result<()> {
    let chm = Chm::open(source)?;

    let count = |kind: EntryKind| chm.entries(kind.mask()).count();
    let files = count(EntryKind::File);
    let directories = count(EntryKind::Directory);
    let special = count(EntryKind::SpecialFile);
    let metadata = count(EntryKind::MetaData);
    let file_bytes: u64 = chm.entries(EntryKinds::FILE).map(crate::Entry::length).sum();
    let toc = chm.sitemap_entry(SitemapKind::Toc).map(|e| e.path().to_string());
    let index = chm.sitemap_entry(SitemapKind::Index).map(|e| e.path().to_string());

    if json {
        let sections: Vec<_> = chm
            .sections()
            .iter()
            .map(|section| match section {
                Section::Uncompressed(s) => json!({
                    "name": section.name(),
                    "base_offset": s.base_offset(),
                }),
                Section::MsCompressed(s) => json!({
                    "name": section.name(),
                    "control": s.control(),
                    "uncompressed_length": s.uncompressed_length(),
                    "compressed_length": s.reset_table().compressed_length,
                    "block_size": s.reset_table().block_size,
                    "blocks": s.reset_table().addresses.len(),
                }),
            })
            .collect();
        let info = json!({
            "file": source.display().to_string(),
            "length": chm.len(),
            "itsf": chm.itsf(),
            "itsp": chm.itsp(),
            "sections": sections,
            "entries": {
                "files": files,
                "directories": directories,
                "special": special,
                "metadata": metadata,
            },
            "toc": toc,
            "index": index,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let itsf = chm.itsf();
    let itsp = chm.itsp();
    println!("CHM Information: {}", source.display());
    println!();
    println!("File size: {} ({} bytes)", format_size(chm.len()), chm.len());
    println!("ITSF version: {}", itsf.version);
    println!("Language: 0x{:04X}", itsf.language_id);
    println!("Timestamp: 0x{:08X}", itsf.timestamp);
    println!(
        "Directory: {} chunks of {} bytes (index depth {})",
        itsp.chunk_count, itsp.chunk_size, itsp.index_depth
    );
    println!();

    println!("Sections:");
    for (i, section) in chm.sections().iter().enumerate() {
        match section {
            Section::Uncompressed(s) => {
                println!("  {i}: {} (at offset {})", section.name(), s.base_offset());
            }
            Section::MsCompressed(s) => {
                let table = s.reset_table();
                println!(
                    "  {i}: {} ({} -> {}, window {}, {} blocks of {}, reset every {})",
                    section.name(),
                    format_size(table.compressed_length),
                    format_size(table.uncompressed_length),
                    format_size(s.control().window_size),
                    table.addresses.len(),
                    format_size(table.block_size),
                    s.control().reset_interval
                );
            }
        }
    }
    println!();

    println!("Entries:");
    println!("  {files:>6} files ({})", format_size(file_bytes));
    println!("  {directories:>6} directories");
    println!("  {special:>6} special files");
    println!("  {metadata:>6} metadata streams");
    println!();
    println!("TOC: {}", toc.as_deref().unwrap_or("(none)"));
    println!("Index: {}", index.as_deref().unwrap_or("(none)"));

    Ok(())
}
