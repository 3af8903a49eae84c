//! Line framing for the `/api/pull` NDJSON body.

use bytes::{Buf, BytesMut};
use serde::Deserialize;

use llamadesk_core::download::DownloadError;
use llamadesk_core::ports::PullChunk;

/// One body line: either progress or `{"error": "..."}`.
#[derive(Deserialize)]
struct PullLine {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    chunk: PullChunk,
}

/// Splits arbitrary byte chunks into complete lines and decodes them.
#[derive(Debug, Default)]
pub(crate) struct NdjsonDecoder {
    buf: BytesMut,
}

impl NdjsonDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next decoded line, or `None` when no complete line is buffered.
    pub(crate) fn next_item(&mut self) -> Option<Result<PullChunk, DownloadError>> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1);
            if let Some(item) = decode_line(&line) {
                return Some(item);
            }
        }
        None
    }

    /// Decode whatever is left once the body ends without a final newline.
    pub(crate) fn finish(&mut self) -> Option<Result<PullChunk, DownloadError>> {
        let rest = self.buf.split();
        decode_line(&rest)
    }
}

/// `None` for blank or unparseable lines.
fn decode_line(line: &[u8]) -> Option<Result<PullChunk, DownloadError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<PullLine>(text) {
        Ok(PullLine {
            error: Some(message),
            ..
        }) => Some(Err(map_error_line(message))),
        Ok(PullLine { chunk, .. }) => Some(Ok(chunk)),
        Err(e) => {
            tracing::debug!(
                target: "llamadesk.ollama",
                error = %e,
                line = %text,
                "Skipping malformed pull line"
            );
            None
        }
    }
}

fn map_error_line(message: String) -> DownloadError {
    if message.to_ascii_lowercase().contains("no space left") {
        DownloadError::DiskFull
    } else {
        DownloadError::Other { message }
    }
}
