//! Pull command handler.

use std::sync::Arc;

use anyhow::{Result, bail};
use indicatif::MultiProgress;

use llamadesk_download::{DownloadQueue, DownloadRequest, DownloadState};

use crate::bootstrap::CliContext;
use crate::presentation::progress::{PullBar, status_line};

/// Outcome of one `pull` invocation.
#[derive(Debug, Default)]
pub struct PullSummary {
    pub downloaded: Vec<String>,
    /// Model name and the reason it did not finish.
    pub incomplete: Vec<(String, String)>,
}

impl PullSummary {
    fn from_requests(requests: &[Arc<DownloadRequest>]) -> Self {
        let mut summary = Self::default();
        for request in requests {
            let progress = request.progress();
            if progress.status.state == DownloadState::Downloaded {
                summary.downloaded.push(request.model_name().to_string());
            } else {
                summary
                    .incomplete
                    .push((request.model_name().to_string(), status_line(&progress)));
            }
        }
        summary
    }

    pub fn all_downloaded(&self) -> bool {
        self.incomplete.is_empty()
    }
}

/// Pull `models` and wait until each one settles or Ctrl-C is pressed.
pub async fn execute(ctx: &CliContext, models: Vec<String>) -> Result<()> {
    let queue = ctx.build_queue()?;
    tracing::info!(
        models = models.len(),
        parallelism = queue.parallelism(),
        url = %ctx.effective().effective_ollama_url(),
        "Starting pull"
    );

    let summary = run(&queue, models).await?;

    for model in &summary.downloaded {
        println!("✓ {model}");
    }
    for (model, reason) in &summary.incomplete {
        println!("✗ {model}: {reason}");
    }

    if !summary.all_downloaded() {
        bail!(
            "{} of {} models were not downloaded",
            summary.incomplete.len(),
            summary.incomplete.len() + summary.downloaded.len()
        );
    }
    Ok(())
}

async fn run(queue: &DownloadQueue, models: Vec<String>) -> Result<PullSummary> {
    let multi = MultiProgress::new();
    let requests: Vec<Arc<DownloadRequest>> =
        models.into_iter().map(DownloadRequest::shared).collect();

    let bars: Vec<PullBar> = requests
        .iter()
        .map(|request| PullBar::attach(&multi, request.model_name(), request.subscribe()))
        .collect();

    for request in &requests {
        queue.enqueue(Arc::clone(request))?;
    }

    let settled = futures_util::future::join_all(requests.iter().map(|request| {
        let mut receiver = request.subscribe();
        async move {
            // The sender lives in the request, which outlives this future.
            let _ = receiver
                .wait_for(|progress| progress.status.state.is_terminal())
                .await;
        }
    }));

    tokio::select! {
        _ = settled => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!("Interrupted, cancelling downloads");
            queue.cancel_all()?;
        }
    }

    queue.dispose().await?;

    for (bar, request) in bars.into_iter().zip(&requests) {
        bar.finish(&request.progress());
    }

    Ok(PullSummary::from_requests(&requests))
}
