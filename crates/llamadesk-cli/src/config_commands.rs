//! Configuration management subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the settings file location and effective values
    Show,
    /// Set how many models are pulled at once (1-16)
    SetParallel {
        value: u32,
    },
    /// Set the Ollama base URL
    SetUrl {
        url: String,
    },
}
