//! Settings file location and persistence.
//!
//! The settings file is `<config dir>/llamadesk/settings.json`, where the
//! config directory comes from `dirs::config_dir()` unless
//! `LLAMADESK_CONFIG_DIR` points elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::{Settings, SettingsError, validate_settings};

/// Environment variable overriding the configuration directory.
pub const ENV_CONFIG_DIR: &str = "LLAMADESK_CONFIG_DIR";

const SETTINGS_FILE: &str = "settings.json";

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,

    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

/// Directory holding llamadesk configuration.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("llamadesk"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Full path of the settings file.
pub fn settings_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Load settings from `path`.
///
/// A missing file yields [`Settings::with_defaults`]. Fields absent from the
/// file fall back to defaults; the result is validated.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(Settings::with_defaults());
    }

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let stored: Settings = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut settings = Settings::with_defaults();
    settings.merge(&stored.as_update());
    validate_settings(&settings)?;
    Ok(settings)
}

/// Validate and write settings to `path` as pretty JSON, creating parent directories.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    validate_settings(settings)?;

    let write_err = |e: &dyn std::fmt::Display| ConfigError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| write_err(&e))?;
    fs::write(path, json).map_err(|e| write_err(&e))?;

    tracing::debug!(path = %path.display(), "Saved settings");
    Ok(())
}
