//! `llamadesk` command-line interface.
//!
//! - `parser` / `commands` / `config_commands` - clap definitions
//! - `bootstrap` - settings loading and adapter wiring
//! - `handlers` - one module per command
//! - `presentation` - progress bars

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, Overrides, bootstrap};
pub use commands::Commands;
pub use config_commands::ConfigCommand;
pub use parser::Cli;
