#![allow(non_snake_case)]
//! # MacChm
//!
//! A pure-Rust reader for Compiled HTML Help (`.chm`) files.
//!
//! ## Supported Features
//!
//! - **ITSF/ITSP containers** - Headers, directory chunks and entry lookup
//! - **LZX** - Decompression of the `MSCompressed` data section
//! - **Sitemaps** - Table of contents (`.hhc`) and keyword index (`.hhk`)
//! - **Merged help** - Resolving `Merge` references across containers
//!
//! ## Quick Start
//!
//! ```no_run
//! use macchm::prelude::*;
//!
//! let chm = Chm::open("manual.chm")?;
//!
//! // List the topic files
//! for entry in chm.entries(EntryKinds::FILE) {
//!     println!("{} ({} bytes)", entry.path(), entry.length());
//! }
//!
//! // Read one entry
//! let html = chm.read_entry("/index.htm")?;
//!
//! // Walk the table of contents
//! if let Some(toc) = chm.toc()? {
//!     for (depth, item) in toc.walk() {
//!         println!("{}{}", "  ".repeat(depth), item.name);
//!     }
//! }
//! # Ok::<(), macchm::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `macchm` command-line binary

pub mod batch;
pub mod container;
pub mod directory;
pub mod error;
pub mod extract;
pub mod headers;
pub mod lzx;
pub mod map;
pub mod reader;
pub mod section;
pub mod sitemap;

#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use container::{Chm, ContainerId, OpenOptions};
pub use directory::{Entry, EntryKind, EntryKinds};
pub use error::{Error, Result};
pub use map::ChmMap;
pub use sitemap::{Merge, Sitemap, SitemapItem, SitemapKind};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::batch::{BatchResult, batch_extract, find_chm_files};
    pub use crate::container::{Chm, OpenOptions};
    pub use crate::directory::{Entry, EntryKind, EntryKinds};
    pub use crate::error::{Error, Result};
    pub use crate::extract::{ExtractSummary, extract_entries, extract_file};
    pub use crate::map::ChmMap;
    pub use crate::section::Section;
    pub use crate::sitemap::{Merge, Sitemap, SitemapItem, SitemapKind};
}
