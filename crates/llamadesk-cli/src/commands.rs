//! Top-level subcommands.

use clap::Subcommand;

use crate::config_commands::ConfigCommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Pull one or more models through the download queue
    Pull {
        /// Model names, e.g. "llama3.2:3b"
        #[arg(required = true)]
        models: Vec<String>,
        /// Number of models pulled at once (1-16), overrides settings
        #[arg(short, long)]
        parallel: Option<u32>,
        /// Ollama base URL, overrides settings
        #[arg(long)]
        url: Option<String>,
    },

    /// View or change persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}
