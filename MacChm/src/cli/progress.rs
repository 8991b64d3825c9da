//! Terminal output for long-running CHM commands

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};

static FINISHED: Emoji<'_, '_> = Emoji("✔ ", "done: ");

/// A phase of a command, printed before its work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Headers, section table and the PMGL chunk walk.
    ReadDirectory,
    /// Decoding LZX block groups and writing topics to disk.
    Inflate,
    /// Opening sibling containers for `Merge` references.
    ResolveMerges,
    /// One extraction per container found under a directory.
    Batch,
}

impl Phase {
    fn icon(self) -> Emoji<'static, 'static> {
        match self {
            Phase::ReadDirectory => Emoji("📖 ", "> "),
            Phase::Inflate => Emoji("🗜  ", "> "),
            Phase::ResolveMerges => Emoji("🔗 ", "+ "),
            Phase::Batch => Emoji("📚 ", "> "),
        }
    }

    /// `(1/2) 📖 detail`
    pub fn announce(self, current: usize, total: usize, detail: &str) {
        println!(
            "{} {}{}",
            style(format!("({current}/{total})")).cyan().dim(),
            self.icon(),
            detail
        );
    }

    /// Unnumbered phase line, for commands with a single optional phase.
    pub fn note(self, detail: &str) {
        println!("{}{}", self.icon(), style(detail).dim());
    }
}

/// Bar over entries or containers; the message shows the one in progress.
///
/// `unit` names what is counted (`topics`, `files`).
#[must_use]
pub fn entry_bar(total: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("  [{bar:32.green/white}] {pos:>5}/{len} {prefix} {wide_msg:.dim}")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb.set_prefix(unit.to_string());
    pb
}

/// `✔ 42 topics (1.3 MiB) in 2 seconds`
pub fn print_extracted(files: usize, bytes: u64, elapsed: Duration) {
    println!(
        "{}{} topics ({}) in {}",
        FINISHED,
        style(files).bold(),
        HumanBytes(bytes),
        HumanDuration(elapsed)
    );
}

/// `✔ 3 of 4 containers in 5 seconds`
pub fn print_batch_finished(succeeded: usize, total: usize, elapsed: Duration) {
    println!(
        "{}{} of {} containers in {}",
        FINISHED,
        style(succeeded).bold(),
        total,
        HumanDuration(elapsed)
    );
}
