//! HTTP reachability probe.

use std::time::Duration;

use async_trait::async_trait;

use llamadesk_core::ports::NetworkReachabilityPort;

use crate::config::OllamaConfig;

/// Reports the network as reachable when a `HEAD` request to the probe URL
/// gets any HTTP response within the timeout.
#[derive(Debug, Clone)]
pub struct HttpReachabilityProbe {
    http: reqwest::Client,
    url: String,
}

impl HttpReachabilityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn from_config(config: &OllamaConfig) -> reqwest::Result<Self> {
        Self::new(config.probe_url.clone(), config.probe_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NetworkReachabilityPort for HttpReachabilityProbe {
    async fn is_reachable(&self) -> bool {
        match self.http.head(&self.url).send().await {
            Ok(response) => {
                tracing::trace!(
                    target: "llamadesk.ollama",
                    url = %self.url,
                    status = response.status().as_u16(),
                    "Reachability probe answered"
                );
                true
            }
            Err(e) => {
                tracing::debug!(
                    target: "llamadesk.ollama",
                    url = %self.url,
                    error = %e,
                    "Reachability probe failed"
                );
                false
            }
        }
    }
}
