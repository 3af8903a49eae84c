//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Pull Ollama models with a bounded download queue.
#[derive(Parser)]
#[command(name = "llamadesk")]
#[command(about = "Queue and pull Ollama models")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
