//! CLI bootstrap: the composition root.
//!
//! Loads settings and wires the Ollama adapters into a [`DownloadQueue`].
//! Command handlers receive the composed context and never construct
//! adapters themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use llamadesk_core::ports::EnglishCatalog;
use llamadesk_core::{Settings, load_settings, settings_path, validate_settings};
use llamadesk_download::{DownloadQueue, ModelPullProcessor};
use llamadesk_ollama::{HttpReachabilityProbe, OllamaClient, OllamaConfig, SystemDiskSpace};

/// Per-invocation overrides from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub parallel: Option<u32>,
    pub ollama_url: Option<String>,
}

/// Loaded configuration for CLI commands.
pub struct CliContext {
    settings_path: PathBuf,
    /// Settings as stored on disk.
    stored: Settings,
    /// Stored settings with environment and flag overrides applied.
    effective: Settings,
}

impl CliContext {
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub const fn stored(&self) -> &Settings {
        &self.stored
    }

    pub const fn effective(&self) -> &Settings {
        &self.effective
    }

    /// Build a download queue against the configured Ollama backend.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build_queue(&self) -> Result<DownloadQueue> {
        let settings = &self.effective;
        let config = OllamaConfig::from_settings(settings);
        tracing::debug!(
            url = %config.base_url,
            remote = config.is_remote,
            probe = %config.probe_url,
            "Wiring Ollama adapters"
        );

        let client = OllamaClient::new(config.clone()).context("Failed to build HTTP client")?;
        let probe =
            HttpReachabilityProbe::from_config(&config).context("Failed to build HTTP client")?;

        let mut processor =
            ModelPullProcessor::new(Arc::new(probe), Arc::new(client), Arc::new(EnglishCatalog));
        if let Some(disk) = SystemDiskSpace::from_settings(settings) {
            processor = processor.with_disk_space(Arc::new(disk));
        }

        Ok(DownloadQueue::from_settings(processor, settings))
    }
}

/// Load settings from disk and apply environment and flag overrides.
pub fn bootstrap(overrides: &Overrides) -> Result<CliContext> {
    let path = settings_path()?;
    bootstrap_from(path, overrides, |key| std::env::var(key).ok())
}

fn bootstrap_from(
    settings_path: PathBuf,
    overrides: &Overrides,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CliContext> {
    let stored = load_settings(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;

    let mut effective = stored.clone();
    effective.apply_overrides(lookup);
    if let Some(n) = overrides.parallel {
        effective.max_parallel_downloads = Some(n);
    }
    if let Some(url) = &overrides.ollama_url {
        effective.ollama_url = Some(url.trim_end_matches('/').to_string());
    }
    validate_settings(&effective).context("Invalid settings override")?;

    Ok(CliContext {
        settings_path,
        stored,
        effective,
    })
}
