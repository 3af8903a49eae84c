//! Config command handler.

use std::path::Path;

use anyhow::{Context, Result};

use llamadesk_core::{Settings, SettingsUpdate, save_settings, validate_settings};

use crate::bootstrap::CliContext;
use crate::config_commands::ConfigCommand;

pub fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            show(ctx);
            Ok(())
        }
        ConfigCommand::SetParallel { value } => {
            let update = SettingsUpdate {
                max_parallel_downloads: Some(Some(value)),
                ..Default::default()
            };
            apply(ctx.settings_path(), ctx.stored(), &update)?;
            println!("✓ Parallel downloads set to {value}");
            Ok(())
        }
        ConfigCommand::SetUrl { url } => {
            let url = url.trim_end_matches('/').to_string();
            let update = SettingsUpdate {
                ollama_url: Some(Some(url.clone())),
                ..Default::default()
            };
            apply(ctx.settings_path(), ctx.stored(), &update)?;
            println!("✓ Ollama URL set to {url}");
            Ok(())
        }
    }
}

fn show(ctx: &CliContext) {
    let settings = ctx.effective();
    println!("Settings file: {}", ctx.settings_path().display());
    println!("  ollama_url:              {}", settings.effective_ollama_url());
    println!(
        "  max_parallel_downloads:  {}",
        settings.effective_max_parallel_downloads()
    );
    match settings.max_queue_size {
        Some(size) => println!("  max_queue_size:          {size}"),
        None => println!("  max_queue_size:          unbounded"),
    }
    println!(
        "  reachability_url:        {}",
        settings.effective_reachability_url()
    );
    println!(
        "  reachability_timeout_ms: {}",
        settings.effective_reachability_timeout_ms()
    );
    println!(
        "  models_dir:              {}",
        settings.models_dir.as_deref().unwrap_or("(Ollama default)")
    );
}

/// Merge `update` into the stored settings, validate and persist.
///
/// Environment overrides are never written back.
fn apply(path: &Path, stored: &Settings, update: &SettingsUpdate) -> Result<()> {
    let mut settings = stored.clone();
    settings.merge(update);
    validate_settings(&settings)?;
    save_settings(path, &settings)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Settings updated");
    Ok(())
}
