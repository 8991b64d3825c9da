//! CLI command for printing the table of contents or keyword index

use std::path::Path;

use console::style;

use crate::cli::progress::Phase;
use crate::container::{Chm, OpenOptions};
use crate::error::Error;
use crate::map::ChmMap;
use crate::sitemap::{Merge, SitemapItem, SitemapKind};

pub fn execute(
    source: &Path,
    index: bool,
    resolve: bool,
    lenient: bool,
    json: bool,
) -> anyhow::Result<()> {
    let kind = if index {
        SitemapKind::Index
    } else {
        SitemapKind::Toc
    };
    let chm = Chm::open(source)?;
    let sitemap = match kind {
        SitemapKind::Toc => chm.toc()?,
        SitemapKind::Index => chm.index()?,
    };
    let mut sitemap = sitemap.ok_or(Error::NoSitemap(match kind {
        SitemapKind::Toc => "TOC",
        SitemapKind::Index => "index",
    }))?;

    if resolve {
        let dir = source.parent().unwrap_or(Path::new("."));
        let map = ChmMap::open_dir(dir, &OpenOptions::default())?;
        if !json {
            Phase::ResolveMerges.note(&format!(
                "Resolving merges against {} CHM files in {}",
                map.len(),
                dir.display()
            ));
        }
        if lenient {
            sitemap.resolve_lenient(&map)?;
        } else {
            sitemap.resolve(&map)?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&sitemap)?);
        return Ok(());
    }

    for (depth, item) in sitemap.walk() {
        println!("{}{}", "  ".repeat(depth), describe(kind, item));
    }
    Ok(())
}

/// One display line for an item.
fn describe(kind: SitemapKind, item: &SitemapItem) -> String {
    let title = match kind {
        SitemapKind::Index if !item.keyword.is_empty() && item.name.is_empty() => &item.keyword,
        _ => &item.name,
    };
    let mut line = title.clone();
    if !item.local.is_empty() {
        line.push_str(&format!(" {}", style(&item.local).dim()));
    }
    if let Some(origin) = &item.origin {
        line.push_str(&format!(" {}", style(format!("({origin})")).cyan()));
    }
    match &item.merge {
        Some(Merge::Reference { container, entry }) => {
            line.push_str(&format!(" [merge {container}::{entry}]"));
        }
        Some(Merge::Other(value)) => line.push_str(&format!(" [merge {value}]")),
        None => {}
    }
    line
}
