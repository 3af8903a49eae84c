//! Connection settings for an Ollama backend.

use std::time::Duration;

use url::{Host, Url};

use llamadesk_core::settings::Settings;

/// Default timeout for establishing a connection to the backend.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the backend lives and how to probe the network before pulling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Base URL without a trailing slash, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Selects the remote variant of "backend unreachable" failures.
    pub is_remote: bool,
    pub connect_timeout: Duration,
    pub probe_url: String,
    pub probe_timeout: Duration,
}

impl OllamaConfig {
    /// Config for `base_url`; `is_remote` is derived from its host.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let is_remote = is_remote_url(&base_url);
        Self {
            base_url,
            is_remote,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            probe_url: llamadesk_core::settings::DEFAULT_REACHABILITY_URL.to_string(),
            probe_timeout: Duration::from_millis(
                llamadesk_core::settings::DEFAULT_REACHABILITY_TIMEOUT_MS,
            ),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.effective_ollama_url())
            .with_probe_url(settings.effective_reachability_url())
            .with_probe_timeout(Duration::from_millis(
                settings.effective_reachability_timeout_ms(),
            ))
    }

    #[must_use]
    pub const fn with_remote(mut self, is_remote: bool) -> Self {
        self.is_remote = is_remote;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Absolute URL of an API path such as `/api/pull`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(llamadesk_core::settings::DEFAULT_OLLAMA_URL)
    }
}

/// Whether `base_url` points anywhere but the loopback interface.
///
/// Unparseable URLs count as local; the connection attempt reports them.
pub fn is_remote_url(base_url: &str) -> bool {
    let Ok(url) = Url::parse(base_url) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => !domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => !ip.is_loopback(),
        Some(Host::Ipv6(ip)) => !ip.is_loopback(),
        None => false,
    }
}
