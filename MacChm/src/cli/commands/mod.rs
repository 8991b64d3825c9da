use clap::Subcommand;
use std::path::PathBuf;
use std::str::FromStr;

use crate::directory::EntryKinds;

pub mod batch;
pub mod cat;
pub mod extract;
pub mod info;
pub mod list;
pub mod toc;

/// Entry kind selection for `list`
#[derive(Debug, Clone, Copy)]
pub struct KindArg(pub EntryKinds);

impl FromStr for KindArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "file" | "files" | "f" => Ok(KindArg(EntryKinds::FILE)),
            "dir" | "dirs" | "directory" | "d" => Ok(KindArg(EntryKinds::DIRECTORY)),
            "special" | "s" => Ok(KindArg(EntryKinds::SPECIAL_FILE)),
            "meta" | "metadata" | "m" => Ok(KindArg(EntryKinds::METADATA)),
            "all" => Ok(KindArg(EntryKinds::ALL)),
            _ => Err(format!(
                "Invalid kind '{s}'. Valid values: file, dir, special, meta, all"
            )),
        }
    }
}

/// Combine `--kind` values; none selects files and directories.
fn kind_mask(kinds: &[KindArg]) -> EntryKinds {
    let mut iter = kinds.iter();
    let Some(first) = iter.next() else {
        return EntryKinds::default();
    };
    iter.fold(first.0, |mask, kind| mask | kind.0)
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show headers, sections and entry counts of a CHM file
    Info {
        /// CHM file
        #[arg(short, long)]
        source: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List CHM contents
    List {
        /// CHM file
        #[arg(short, long)]
        source: PathBuf,

        /// Entry kinds to list: file, dir, special, meta, all (default: file,dir)
        #[arg(short, long, value_delimiter = ',')]
        kind: Vec<KindArg>,

        /// Show detailed info (section, offset, size)
        #[arg(short, long)]
        detailed: bool,

        /// Only list entries matching glob pattern (e.g., "*.htm")
        #[arg(long)]
        filter: Option<String>,

        /// Only show count of matching entries
        #[arg(short, long)]
        count: bool,

        /// Print entries as JSON
        #[arg(long, conflicts_with = "count")]
        json: bool,
    },

    /// Extract a CHM file
    Extract {
        /// Source CHM file
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        destination: PathBuf,

        /// Only extract files matching glob pattern (e.g., "*.htm", "/images/*")
        #[arg(long, conflicts_with = "file")]
        filter: Option<String>,

        /// Extract a single file by internal path
        #[arg(long, conflicts_with = "filter")]
        file: Option<String>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write one entry to stdout
    Cat {
        /// CHM file
        #[arg(short, long)]
        source: PathBuf,

        /// Internal path (e.g., "/index.htm")
        path: String,
    },

    /// Print the table of contents or the keyword index
    Toc {
        /// CHM file
        #[arg(short, long)]
        source: PathBuf,

        /// Read the keyword index (.hhk) instead of the TOC (.hhc)
        #[arg(long)]
        index: bool,

        /// Resolve merge references against the .chm files next to the source
        #[arg(short, long)]
        resolve: bool,

        /// Keep merge references that cannot be resolved
        #[arg(long, requires = "resolve")]
        lenient: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract every CHM file found below a directory
    BatchExtract {
        /// Directory to search for CHM files
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        destination: PathBuf,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { source, json } => info::execute(source, *json),
            Commands::List {
                source,
                kind,
                detailed,
                filter,
                count,
                json,
            } => list::execute(
                source,
                kind_mask(kind),
                *detailed,
                filter.as_deref(),
                *count,
                *json,
            ),
            Commands::Extract {
                source,
                destination,
                filter,
                file,
                quiet,
            } => extract::execute(source, destination, filter.as_deref(), file.as_deref(), !*quiet),
            Commands::Cat { source, path } => cat::execute(source, path),
            Commands::Toc {
                source,
                index,
                resolve,
                lenient,
                json,
            } => toc::execute(source, *index, *resolve, *lenient, *json),
            Commands::BatchExtract {
                source,
                destination,
            } => batch::execute(source, destination),
        }
    }
}
