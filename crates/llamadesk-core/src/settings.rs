//! Settings domain types and validation.
//!
//! Pure types: loading and saving live in [`crate::paths`].

use serde::{Deserialize, Serialize};

/// Default Ollama API endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default URL probed to decide whether the internet is reachable.
pub const DEFAULT_REACHABILITY_URL: &str = "https://registry.ollama.ai";

/// Default number of concurrent model pulls.
pub const DEFAULT_MAX_PARALLEL_DOWNLOADS: u32 = 2;

/// Default reachability probe timeout in milliseconds.
pub const DEFAULT_REACHABILITY_TIMEOUT_MS: u64 = 800;

/// Environment variable overriding the Ollama URL.
pub const ENV_OLLAMA_URL: &str = "LLAMADESK_OLLAMA_URL";

/// Environment variable overriding the parallel download count.
pub const ENV_MAX_PARALLEL: &str = "LLAMADESK_MAX_PARALLEL";

/// Application settings structure.
///
/// All fields are optional to support partial files and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the Ollama API.
    pub ollama_url: Option<String>,

    /// Maximum number of models pulled concurrently (1-16).
    pub max_parallel_downloads: Option<u32>,

    /// Maximum number of pulls waiting in the queue (1-500). `None` = unbounded.
    pub max_queue_size: Option<u32>,

    /// URL probed before each download.
    pub reachability_url: Option<String>,

    /// Probe timeout in milliseconds (50-10000).
    pub reachability_timeout_ms: Option<u64>,

    /// Directory the backend stores models in, used for free-space checks.
    pub models_dir: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            ollama_url: Some(DEFAULT_OLLAMA_URL.to_string()),
            max_parallel_downloads: Some(DEFAULT_MAX_PARALLEL_DOWNLOADS),
            max_queue_size: None,
            reachability_url: Some(DEFAULT_REACHABILITY_URL.to_string()),
            reachability_timeout_ms: Some(DEFAULT_REACHABILITY_TIMEOUT_MS),
            models_dir: None,
        }
    }

    /// Get the effective Ollama URL (with default fallback).
    pub fn effective_ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn effective_reachability_url(&self) -> &str {
        self.reachability_url
            .as_deref()
            .unwrap_or(DEFAULT_REACHABILITY_URL)
    }

    #[must_use]
    pub const fn effective_max_parallel_downloads(&self) -> u32 {
        match self.max_parallel_downloads {
            Some(n) => n,
            None => DEFAULT_MAX_PARALLEL_DOWNLOADS,
        }
    }

    #[must_use]
    pub const fn effective_reachability_timeout_ms(&self) -> u64 {
        match self.reachability_timeout_ms {
            Some(ms) => ms,
            None => DEFAULT_REACHABILITY_TIMEOUT_MS,
        }
    }

    /// Merge a partial update, only touching fields that are `Some`.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref url) = other.ollama_url {
            self.ollama_url.clone_from(url);
        }
        if let Some(ref n) = other.max_parallel_downloads {
            self.max_parallel_downloads = *n;
        }
        if let Some(ref size) = other.max_queue_size {
            self.max_queue_size = *size;
        }
        if let Some(ref url) = other.reachability_url {
            self.reachability_url.clone_from(url);
        }
        if let Some(ref ms) = other.reachability_timeout_ms {
            self.reachability_timeout_ms = *ms;
        }
        if let Some(ref dir) = other.models_dir {
            self.models_dir.clone_from(dir);
        }
    }

    /// Treat the fields set in `self` as an update; unset fields are left alone.
    #[must_use]
    pub fn as_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            ollama_url: self.ollama_url.clone().map(Some),
            max_parallel_downloads: self.max_parallel_downloads.map(Some),
            max_queue_size: self.max_queue_size.map(Some),
            reachability_url: self.reachability_url.clone().map(Some),
            reachability_timeout_ms: self.reachability_timeout_ms.map(Some),
            models_dir: self.models_dir.clone().map(Some),
        }
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            self.ollama_url = Some(url.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_MAX_PARALLEL) {
            match raw.trim().parse::<u32>() {
                Ok(n) => self.max_parallel_downloads = Some(n),
                Err(e) => tracing::warn!(
                    var = ENV_MAX_PARALLEL,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid override"
                ),
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub ollama_url: Option<Option<String>>,
    pub max_parallel_downloads: Option<Option<u32>>,
    pub max_queue_size: Option<Option<u32>>,
    pub reachability_url: Option<Option<String>>,
    pub reachability_timeout_ms: Option<Option<u64>>,
    pub models_dir: Option<Option<String>>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Max parallel downloads must be between 1 and 16, got {0}")]
    InvalidParallelism(u32),

    #[error("Max queue size must be between 1 and 500, got {0}")]
    InvalidQueueSize(u32),

    #[error("Reachability timeout must be between 50 and 10000 ms, got {0}")]
    InvalidTimeout(u64),

    #[error("{field} must be an http:// or https:// URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(n) = settings.max_parallel_downloads {
        if !(1..=16).contains(&n) {
            return Err(SettingsError::InvalidParallelism(n));
        }
    }

    if let Some(size) = settings.max_queue_size {
        if !(1..=500).contains(&size) {
            return Err(SettingsError::InvalidQueueSize(size));
        }
    }

    if let Some(ms) = settings.reachability_timeout_ms {
        if !(50..=10_000).contains(&ms) {
            return Err(SettingsError::InvalidTimeout(ms));
        }
    }

    for (field, value) in [
        ("ollama_url", &settings.ollama_url),
        ("reachability_url", &settings.reachability_url),
    ] {
        if let Some(url) = value {
            if !is_http_url(url) {
                return Err(SettingsError::InvalidUrl {
                    field,
                    value: url.clone(),
                });
            }
        }
    }

    Ok(())
}
