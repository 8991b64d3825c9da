//! Table of contents (`.hhc`) and keyword index (`.hhk`) sitemaps
//!
//! Both files are HTML holding nested `<UL>` lists of
//! `<OBJECT type="text/sitemap">` elements. An item may carry a `Merge`
//! parameter naming a sitemap inside another container; [`Sitemap::resolve`]
//! splices those in using a [`ChmMap`].
//!
//! # Example
//!
//! ```no_run
//! use macchm::{Chm, ChmMap};
//!
//! let mut map = ChmMap::new();
//! map.insert("B.chm", Chm::open("B.chm")?);
//!
//! let a = Chm::open("A.chm")?;
//! if let Some(mut toc) = a.toc()? {
//!     toc.resolve(&map)?;
//!     for (depth, item) in toc.walk() {
//!         println!("{}{}", "  ".repeat(depth), item.name);
//!     }
//! }
//! # Ok::<(), macchm::Error>(())
//! ```

mod item;
mod markup;

pub use item::{Merge, SitemapItem};

use std::io::{Read, Seek};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::map::ChmMap;
use markup::Element;

/// Merge references deeper than this are treated as a cycle.
pub const MAX_MERGE_DEPTH: usize = 16;

/// Which sitemap of a container to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SitemapKind {
    /// Table of contents.
    Toc,
    /// Keyword index.
    Index,
}

impl SitemapKind {
    /// File extension of the sitemap entry, with the dot.
    pub fn extension(self) -> &'static str {
        match self {
            SitemapKind::Toc => ".hhc",
            SitemapKind::Index => ".hhk",
        }
    }
}

impl std::fmt::Display for SitemapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SitemapKind::Toc => "TOC",
            SitemapKind::Index => "index",
        })
    }
}

/// A parsed sitemap: the top-level items of the outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sitemap {
    items: Vec<SitemapItem>,
}

impl Sitemap {
    /// Parse the raw bytes of a `.hhc`/`.hhk` entry.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = markup::decode(bytes);
        let document = markup::parse_document(&text)?;
        let body = document.body();

        let mut lists = body.children_named("ul");
        let items = match (lists.next(), lists.next()) {
            (Some(list), None) => items_from_list(list)?,
            (Some(_), Some(_)) => {
                return Err(Error::InvalidSitemap(
                    "more than one root list in the sitemap".to_string(),
                ));
            }
            (None, _) => {
                let objects: Vec<&Element> = body
                    .children
                    .iter()
                    .filter(|child| child.is_sitemap_object())
                    .collect();
                if objects.is_empty() {
                    return Err(Error::InvalidSitemap("no root list in the sitemap".to_string()));
                }
                objects
                    .into_iter()
                    .map(SitemapItem::from_object)
                    .collect::<Result<Vec<_>>>()?
            }
        };

        tracing::debug!("Parsed sitemap with {} top-level items", items.len());
        Ok(Self { items })
    }

    pub fn items(&self) -> &[SitemapItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<SitemapItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every item, depth first, with its nesting depth.
    pub fn walk(&self) -> Vec<(usize, &SitemapItem)> {
        self.items
            .iter()
            .flat_map(SitemapItem::walk)
            .collect()
    }

    /// Replace merge references with the items of the sitemaps they name.
    ///
    /// Fails with [`Error::MissingContainer`] or [`Error::MissingEntry`]
    /// when a reference cannot be followed.
    pub fn resolve<R: Read + Seek>(&mut self, map: &ChmMap<R>) -> Result<()> {
        self.resolve_with(map, false)
    }

    /// Like [`resolve`](Self::resolve), but keeps items whose reference
    /// cannot be followed.
    pub fn resolve_lenient<R: Read + Seek>(&mut self, map: &ChmMap<R>) -> Result<()> {
        self.resolve_with(map, true)
    }

    fn resolve_with<R: Read + Seek>(&mut self, map: &ChmMap<R>, lenient: bool) -> Result<()> {
        let items = std::mem::take(&mut self.items);
        self.items = item::resolve_items(items, map, lenient, 0)?;
        Ok(())
    }
}

/// Items of a `<UL>`: every sitemap object of every `<LI>`.
///
/// A nested list holds the children of the item before it, whether it
/// sits inside the `<LI>` or next to it.
fn items_from_list(list: &Element) -> Result<Vec<SitemapItem>> {
    let mut items: Vec<SitemapItem> = Vec::new();
    for child in &list.children {
        if child.is("li") {
            for part in &child.children {
                add_list_part(&mut items, part)?;
            }
        } else {
            add_list_part(&mut items, child)?;
        }
    }
    Ok(items)
}

fn add_list_part(items: &mut Vec<SitemapItem>, part: &Element) -> Result<()> {
    if part.is_sitemap_object() {
        items.push(SitemapItem::from_object(part)?);
    } else if part.is("ul") {
        let children = items_from_list(part)?;
        match items.last_mut() {
            Some(parent) => parent.children.extend(children),
            None => items.extend(children),
        }
    }
    Ok(())
}
