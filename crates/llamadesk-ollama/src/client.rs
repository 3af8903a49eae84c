//! Ollama pull client.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use llamadesk_core::download::DownloadError;
use llamadesk_core::ports::{ModelPullPort, PullStream};

use crate::config::OllamaConfig;
use crate::ndjson::NdjsonDecoder;

/// HTTP client for an Ollama backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

struct PullState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: NdjsonDecoder,
    cancel: CancellationToken,
    done: bool,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn unreachable(&self) -> DownloadError {
        DownloadError::backend_unreachable(&self.config.base_url, self.config.is_remote)
    }

    fn map_send_error(&self, err: &reqwest::Error) -> DownloadError {
        if err.is_connect() || err.is_timeout() {
            self.unreachable()
        } else {
            DownloadError::connection_lost(err.to_string())
        }
    }
}

#[async_trait]
impl ModelPullPort for OllamaClient {
    async fn pull(
        &self,
        model: &str,
        cancel: CancellationToken,
    ) -> Result<PullStream, DownloadError> {
        let url = self.config.endpoint("/api/pull");
        tracing::debug!(target: "llamadesk.ollama", model = %model, url = %url, "POST /api/pull");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "model": model, "stream": true }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "llamadesk.ollama", url = %url, error = %e, "Pull request failed");
                self.map_send_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(DownloadError::api(status.as_u16(), message));
        }

        let state = PullState {
            body: response.bytes_stream().boxed(),
            decoder: NdjsonDecoder::default(),
            cancel,
            done: false,
        };
        Ok(pull_stream(state))
    }
}

/// Turn the response body into decoded chunks.
///
/// Cancellation yields one `Cancelled` error and drops the body, which
/// closes the connection and stops the backend's stream.
fn pull_stream(state: PullState) -> PullStream {
    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            if let Some(item) = st.decoder.next_item() {
                return Some((item, st));
            }

            let next = tokio::select! {
                biased;
                () = st.cancel.cancelled() => None,
                next = st.body.next() => Some(next),
            };
            let Some(next) = next else {
                st.done = true;
                return Some((Err(DownloadError::Cancelled), st));
            };

            match next {
                Some(Ok(bytes)) => st.decoder.push(&bytes),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(DownloadError::connection_lost(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    return st.decoder.finish().map(|item| (item, st));
                }
            }
        }
    })
    .boxed()
}
