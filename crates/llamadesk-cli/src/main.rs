//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use llamadesk_cli::{Cli, Commands, Overrides, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "llamadesk=debug" } else { "llamadesk=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stderr keeps progress bars on stdout intact
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Pull {
            models,
            parallel,
            url,
        } => {
            let ctx = bootstrap(&Overrides {
                parallel,
                ollama_url: url,
            })?;
            handlers::pull::execute(&ctx, models).await
        }
        Commands::Config { command } => {
            let ctx = bootstrap(&Overrides::default())?;
            handlers::config::execute(&ctx, command)
        }
    }
}
