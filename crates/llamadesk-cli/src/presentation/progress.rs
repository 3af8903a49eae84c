//! Terminal progress bars for queued pulls.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use llamadesk_core::utils::{format_bytes, format_megabytes_per_second};
use llamadesk_download::{DownloadProgress, DownloadState};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:<24} [{bar:30.cyan/blue}] {percent:>3}% {msg}";
const WAIT_TEMPLATE: &str = "{spinner:.green} {prefix:<24} {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn wait_style() -> ProgressStyle {
    ProgressStyle::with_template(WAIT_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Status text shown next to a bar.
pub fn status_line(progress: &DownloadProgress) -> String {
    let state = progress.status.state;
    match state {
        DownloadState::Downloading => {
            let mut line = match progress.total_bytes {
                Some(total) => format!(
                    "{} / {}",
                    format_bytes(progress.downloaded_bytes),
                    format_bytes(total)
                ),
                None => format_bytes(progress.downloaded_bytes),
            };
            if progress.speed_mbps > 0.0 {
                line.push_str("  ");
                line.push_str(&format_megabytes_per_second(progress.speed_mbps));
            }
            if progress.part_count > 1 {
                line.push_str(&format!("  (part {})", progress.part_count));
            }
            line
        }
        DownloadState::Failed | DownloadState::Unconfirmed => progress
            .status
            .message
            .clone()
            .unwrap_or_else(|| state.to_string()),
        _ => state.to_string(),
    }
}

/// One bar per model, redrawn from the request's progress channel.
pub struct PullBar {
    bar: ProgressBar,
    follower: JoinHandle<()>,
}

impl PullBar {
    pub fn attach(
        multi: &MultiProgress,
        model: &str,
        receiver: watch::Receiver<DownloadProgress>,
    ) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(wait_style());
        bar.set_prefix(model.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));

        let follower = tokio::spawn(follow(receiver, bar.clone()));
        Self { bar, follower }
    }

    /// Stop following and leave the final status on screen.
    pub fn finish(self, progress: &DownloadProgress) {
        self.follower.abort();
        render(&self.bar, progress);
        self.bar.finish();
    }
}

async fn follow(mut receiver: watch::Receiver<DownloadProgress>, bar: ProgressBar) {
    loop {
        let progress = receiver.borrow_and_update().clone();
        render(&bar, &progress);
        if receiver.changed().await.is_err() {
            break;
        }
    }
}

fn render(bar: &ProgressBar, progress: &DownloadProgress) {
    if let Some(total) = progress.total_bytes.filter(|&total| total > 0) {
        if bar.length() != Some(total) {
            bar.set_style(bar_style());
            bar.set_length(total);
        }
        bar.set_position(progress.downloaded_bytes);
    }
    bar.set_message(status_line(progress));
}
