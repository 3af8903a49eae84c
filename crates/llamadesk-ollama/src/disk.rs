//! Free-space check for the backend's model directory.

use std::path::{Path, PathBuf};

use sysinfo::Disks;

use llamadesk_core::ports::DiskSpacePort;
use llamadesk_core::settings::Settings;

/// Environment variable Ollama reads its model directory from.
pub const ENV_OLLAMA_MODELS: &str = "OLLAMA_MODELS";

/// Ollama's model directory: `$OLLAMA_MODELS`, else `~/.ollama/models`.
pub fn default_models_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(ENV_OLLAMA_MODELS).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::home_dir().map(|home| home.join(".ollama").join("models"))
}

/// Disk-space adapter backed by `sysinfo`.
///
/// Answers `true` whenever the directory's disk cannot be determined: the
/// backend still reports real exhaustion as a failed pull.
#[derive(Debug, Clone)]
pub struct SystemDiskSpace {
    models_dir: PathBuf,
}

impl SystemDiskSpace {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Use `settings.models_dir`, falling back to Ollama's default.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings
            .models_dir
            .as_deref()
            .map(PathBuf::from)
            .or_else(default_models_dir)
            .map(Self::new)
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Free bytes on the disk holding the models directory.
    pub fn available_space(&self) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();
        let target = resolve(&self.models_dir);
        available_on(
            &target,
            disks
                .list()
                .iter()
                .map(|disk| (disk.mount_point(), disk.available_space())),
        )
    }
}

impl DiskSpacePort for SystemDiskSpace {
    fn has_enough_space(&self, required_bytes: u64) -> bool {
        match self.available_space() {
            Some(available) => {
                tracing::debug!(
                    target: "llamadesk.ollama",
                    dir = %self.models_dir.display(),
                    available,
                    required = required_bytes,
                    "Disk space check"
                );
                available >= required_bytes
            }
            None => {
                tracing::debug!(
                    target: "llamadesk.ollama",
                    dir = %self.models_dir.display(),
                    "No disk found for models directory, skipping space check"
                );
                true
            }
        }
    }
}

/// Canonicalize the closest existing ancestor, since the directory may
/// not have been created yet.
fn resolve(path: &Path) -> PathBuf {
    path.ancestors()
        .find_map(|ancestor| {
            let canonical = ancestor.canonicalize().ok()?;
            let rest = path.strip_prefix(ancestor).ok()?;
            Some(canonical.join(rest))
        })
        .unwrap_or_else(|| path.to_path_buf())
}

/// Available bytes on the mount point that is the longest prefix of `path`.
fn available_on<'a>(
    path: &Path,
    mounts: impl IntoIterator<Item = (&'a Path, u64)>,
) -> Option<u64> {
    mounts
        .into_iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, available)| available)
}
