//! MacChm CLI - Command-line interface for CHM help files

pub mod commands;
pub mod filter;
pub mod progress;

use clap::Parser;
use commands::Commands;
use tracing::Level;

#[derive(Parser)]
#[command(name = "macchm", version = crate::VERSION)]
#[command(about = "MacChm: Compiled HTML Help (CHM) tools", long_about = None)]
struct Cli {
    /// Log parsing and decompression details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Run the MacChm CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging (stderr, so `cat` output stays clean)
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute()?;

    Ok(())
}
