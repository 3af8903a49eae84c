//! Localization port for user-facing download messages.
//!
//! Templates use positional placeholders: `{0}`, `{1}`, ... Literal braces
//! are written `{{` and `}}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keys of the messages the download queue can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKey {
    NoInternetConnection,
    LostInternetConnection,
    OllamaLocalUnreachable,
    OllamaRemoteUnreachable,
    /// Takes one argument: status code or raw error text.
    DownloadFailed,
    /// Takes one argument: human-readable size.
    DiskSpaceInsufficient,
    DiskFullDuringDownload,
    DownloadUnconfirmed,
}

impl MessageKey {
    /// Stable resource identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoInternetConnection => "NO_INTERNET_CONNECTION",
            Self::LostInternetConnection => "LOST_INTERNET_CONNECTION",
            Self::OllamaLocalUnreachable => "OLLAMA_LOCAL_UNREACHABLE",
            Self::OllamaRemoteUnreachable => "OLLAMA_REMOTE_UNREACHABLE",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::DiskSpaceInsufficient => "DISK_SPACE_INSUFFICIENT",
            Self::DiskFullDuringDownload => "DISK_FULL_DURING_DOWNLOAD",
            Self::DownloadUnconfirmed => "DOWNLOAD_UNCONFIRMED",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template formatting failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocalizeError {
    #[error("Placeholder {{{index}}} has no argument ({provided} provided)")]
    MissingArgument { index: usize, provided: usize },

    #[error("Malformed template at byte {position}: {template}")]
    MalformedTemplate { template: String, position: usize },
}

/// Port for looking up and formatting localized strings.
pub trait LocalizerPort: Send + Sync {
    /// Template for `key` in the active language.
    fn get_string(&self, key: MessageKey) -> String;

    /// Substitute `args` into `template`.
    fn format(&self, template: &str, args: &[String]) -> Result<String, LocalizeError> {
        format_template(template, args)
    }
}

/// Substitute positional `{N}` placeholders.
///
/// Fails when a placeholder refers to a missing argument or a brace is
/// unbalanced. Extra arguments are ignored.
pub fn format_template(template: &str, args: &[String]) -> Result<String, LocalizeError> {
    let malformed = |position| LocalizeError::MalformedTemplate {
        template: template.to_string(),
        position,
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(malformed(pos)),
                    }
                }
                let index: usize = digits.parse().map_err(|_| malformed(pos))?;
                let arg = args.get(index).ok_or(LocalizeError::MissingArgument {
                    index,
                    provided: args.len(),
                })?;
                out.push_str(arg);
            }
            '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed(pos)),
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl LocalizerPort for EnglishCatalog {
    fn get_string(&self, key: MessageKey) -> String {
        match key {
            MessageKey::NoInternetConnection => {
                "No internet connection. Check your network and try again."
            }
            MessageKey::LostInternetConnection => {
                "The internet connection was lost during the download."
            }
            MessageKey::OllamaLocalUnreachable => {
                "Cannot reach the local Ollama server. Make sure it is running."
            }
            MessageKey::OllamaRemoteUnreachable => "Cannot reach the remote Ollama server.",
            MessageKey::DownloadFailed => "Download failed: {0}",
            MessageKey::DiskSpaceInsufficient => "Not enough disk space. {0} required.",
            MessageKey::DiskFullDuringDownload => "The disk became full during the download.",
            MessageKey::DownloadUnconfirmed => {
                "The download ended without confirmation from the server."
            }
        }
        .to_string()
    }
}
