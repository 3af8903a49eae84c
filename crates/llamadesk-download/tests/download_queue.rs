//! End-to-end tests for `DownloadQueue` with scripted backend ports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use llamadesk_core::ports::{
    DiskSpacePort, EnglishCatalog, LocalizerPort, MessageKey, ModelPullPort,
    NetworkReachabilityPort, PullChunk, PullStream,
};
use llamadesk_core::work::WorkItem;
use llamadesk_download::{
    DownloadError, DownloadQueue, DownloadRequest, DownloadState, ModelPullProcessor,
    QueueConfig,
};

#[derive(Clone, Debug)]
enum Step {
    Chunk(PullChunk),
    Fail(DownloadError),
    Sleep(Duration),
    /// Never yields another chunk.
    Hang,
}

/// Backend whose successive `pull` calls follow successive scripts.
#[derive(Default)]
struct ScriptedPuller {
    scripts: Mutex<VecDeque<Result<Vec<Step>, DownloadError>>>,
    calls: AtomicUsize,
}

impl ScriptedPuller {
    fn with_scripts(scripts: Vec<Result<Vec<Step>, DownloadError>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelPullPort for ScriptedPuller {
    async fn pull(
        &self,
        _model: &str,
        _cancel: CancellationToken,
    ) -> Result<PullStream, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DownloadError::other("no script left")))?;

        let stream = futures_util::stream::unfold(script.into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    Step::Chunk(chunk) => return Some((Ok(chunk), steps)),
                    Step::Fail(err) => return Some((Err(err), steps)),
                    Step::Sleep(delay) => tokio::time::sleep(delay).await,
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        });
        Ok(stream.boxed())
    }
}

struct FakeNetwork(AtomicBool);

impl FakeNetwork {
    fn up() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }
    fn down() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(false)))
    }
}

#[async_trait]
impl NetworkReachabilityPort for FakeNetwork {
    async fn is_reachable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct FakeDisk {
    free_bytes: u64,
}

impl DiskSpacePort for FakeDisk {
    fn has_enough_space(&self, required_bytes: u64) -> bool {
        required_bytes <= self.free_bytes
    }
}

fn english(key: MessageKey) -> String {
    EnglishCatalog.get_string(key)
}

fn success_script() -> Vec<Step> {
    vec![
        Step::Chunk(PullChunk::status("pulling manifest")),
        Step::Chunk(PullChunk::progress("pulling 6a0746a1ec1a", 0, 100)),
        Step::Sleep(Duration::from_millis(5)),
        Step::Chunk(PullChunk::progress("pulling 6a0746a1ec1a", 50, 100)),
        Step::Sleep(Duration::from_millis(5)),
        Step::Chunk(PullChunk::progress("pulling 6a0746a1ec1a", 100, 100)),
        Step::Chunk(PullChunk::status("verifying sha256 digest")),
        Step::Chunk(PullChunk::status("success")),
    ]
}

fn build_queue(
    network: Arc<FakeNetwork>,
    puller: Arc<ScriptedPuller>,
    parallelism: usize,
) -> DownloadQueue {
    let processor = ModelPullProcessor::new(network, puller, Arc::new(EnglishCatalog));
    DownloadQueue::new(
        processor,
        QueueConfig::default().with_max_parallelism(parallelism),
    )
}

async fn wait_for_state(request: &DownloadRequest, state: DownloadState) {
    let mut rx = request.subscribe();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.status.state == state),
    )
    .await;
    assert!(
        matches!(result, Ok(Ok(_))),
        "timed out waiting for {state}, last status: {:?}",
        request.status()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn successful_pull_reaches_downloaded() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(success_script())]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let request = DownloadRequest::shared("llama3.2:3b");

    let mut rx = request.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().status.state;
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            if state.is_terminal() {
                break;
            }
        }
        seen
    });

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Downloaded).await;

    let progress = request.progress();
    assert_eq!(progress.downloaded_bytes, 100);
    assert_eq!(progress.total_bytes, Some(100));
    assert_eq!(progress.part_count, 1);
    assert_eq!(progress.status.message, None);
    assert_eq!(puller.calls(), 1);

    let seen = tokio_test::assert_ok!(observer.await);
    assert!(seen.contains(&DownloadState::Downloading), "{seen:?}");
    assert_eq!(seen.last(), Some(&DownloadState::Downloaded));

    queue.dispose().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changed_total_counts_a_new_part() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
        Step::Chunk(PullChunk::progress("pulling a", 10, 100)),
        Step::Chunk(PullChunk::progress("pulling a", 100, 100)),
        Step::Chunk(PullChunk::progress("pulling b", 5, 300)),
        Step::Chunk(PullChunk::progress("pulling b", 300, 300)),
        Step::Chunk(PullChunk::status("success")),
    ])]);
    let queue = build_queue(FakeNetwork::up(), puller, 1);
    let request = DownloadRequest::shared("mixtral:8x7b");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Downloaded).await;

    let progress = request.progress();
    assert_eq!(progress.part_count, 2);
    assert_eq!(progress.total_bytes, Some(300));
    assert_eq!(progress.downloaded_bytes, 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_network_fails_before_any_bytes() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(success_script())]);
    let queue = build_queue(FakeNetwork::down(), Arc::clone(&puller), 1);
    let request = DownloadRequest::shared("phi3");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Failed).await;

    let progress = request.progress();
    assert_eq!(
        progress.status.message,
        Some(english(MessageKey::NoInternetConnection))
    );
    assert_eq!(progress.downloaded_bytes, 0);
    assert_eq!(progress.total_bytes, None);
    assert_eq!(puller.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_error_message_contains_status_code() {
    let puller = ScriptedPuller::with_scripts(vec![Err(DownloadError::api(
        503,
        "Service Unavailable",
    ))]);
    let queue = build_queue(FakeNetwork::up(), puller, 1);
    let request = DownloadRequest::shared("gemma2:9b");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Failed).await;

    let message = request.status().message.unwrap();
    assert!(message.contains("503"), "{message}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn insufficient_disk_space_reports_readable_size() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
        Step::Chunk(PullChunk::status("pulling manifest")),
        Step::Chunk(PullChunk::progress("pulling 74701a8c35f6", 0, 4_000_000_000)),
        Step::Hang,
    ])]);
    let processor = ModelPullProcessor::new(
        FakeNetwork::up(),
        puller,
        Arc::new(EnglishCatalog),
    )
    .with_disk_space(Arc::new(FakeDisk {
        free_bytes: 1_000_000_000,
    }));
    let queue = DownloadQueue::new(processor, QueueConfig::default());
    let request = DownloadRequest::shared("llama3.1:8b");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Failed).await;

    let message = request.status().message.unwrap();
    assert!(message.contains("4.0 GB"), "{message}");
    assert!(!message.contains("4000000000"), "{message}");
    assert_eq!(request.progress().downloaded_bytes, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mid_stream_errors_map_to_their_messages() {
    let cases = [
        (
            DownloadError::connection_lost("connection reset"),
            english(MessageKey::LostInternetConnection),
        ),
        (DownloadError::DiskFull, english(MessageKey::DiskFullDuringDownload)),
        (
            DownloadError::backend_unreachable("http://localhost:11434", false),
            english(MessageKey::OllamaLocalUnreachable),
        ),
        (
            DownloadError::backend_unreachable("http://gpu-box:11434", true),
            english(MessageKey::OllamaRemoteUnreachable),
        ),
        (
            DownloadError::other("pull model manifest: file does not exist"),
            "Download failed: pull model manifest: file does not exist".to_string(),
        ),
    ];

    for (error, expected) in cases {
        let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
            Step::Chunk(PullChunk::progress("pulling", 10, 100)),
            Step::Fail(error.clone()),
        ])]);
        let queue = build_queue(FakeNetwork::up(), puller, 1);
        let request = DownloadRequest::shared("qwen2.5:7b");

        queue.enqueue(Arc::clone(&request)).unwrap();
        wait_for_state(&request, DownloadState::Failed).await;

        let progress = request.progress();
        assert_eq!(progress.status.message.as_deref(), Some(expected.as_str()));
        assert!(progress.speed_mbps.abs() < f64::EPSILON, "{error:?}");
        queue.dispose().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_ending_without_marker_is_unconfirmed() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
        Step::Chunk(PullChunk::progress("pulling", 100, 100)),
        Step::Chunk(PullChunk::status("verifying sha256 digest")),
    ])]);
    let queue = build_queue(FakeNetwork::up(), puller, 1);
    let request = DownloadRequest::shared("mistral");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Unconfirmed).await;

    assert_eq!(
        request.status().message,
        Some(english(MessageKey::DownloadUnconfirmed))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_request_zeroes_speed_and_isolates_siblings() {
    let puller = ScriptedPuller::with_scripts(vec![
        Ok(vec![
            Step::Chunk(PullChunk::progress("pulling", 0, 1_000_000_000)),
            Step::Sleep(Duration::from_millis(20)),
            Step::Chunk(PullChunk::progress("pulling", 50_000_000, 1_000_000_000)),
            Step::Hang,
        ]),
        Ok(vec![
            Step::Chunk(PullChunk::progress("pulling", 1, 10)),
            Step::Hang,
        ]),
    ]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 2);
    let first = DownloadRequest::shared("llama3:70b");
    let second = DownloadRequest::shared("tinyllama");

    queue.enqueue(Arc::clone(&first)).unwrap();
    wait_for_state(&first, DownloadState::Downloading).await;
    queue.enqueue(Arc::clone(&second)).unwrap();
    wait_for_state(&second, DownloadState::Downloading).await;

    let mut rx = first.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.downloaded_bytes == 50_000_000),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(first.progress().speed_mbps > 0.0);

    first.cancel();
    wait_for_state(&first, DownloadState::Downloadable).await;

    assert!(first.progress().speed_mbps.abs() < f64::EPSILON);
    assert_eq!(first.status().message, None);
    assert_eq!(second.state(), DownloadState::Downloading);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while queue.running_count() != 1 {
        assert!(tokio::time::Instant::now() < deadline, "first pull never released its slot");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    queue.dispose().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_all_resets_running_and_queued_requests() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
        Step::Chunk(PullChunk::progress("pulling", 1, 10)),
        Step::Hang,
    ])]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let running = DownloadRequest::shared("codellama");
    let waiting = DownloadRequest::shared("starcoder2");

    queue.enqueue(Arc::clone(&running)).unwrap();
    queue.enqueue(Arc::clone(&waiting)).unwrap();
    wait_for_state(&running, DownloadState::Downloading).await;
    assert_eq!(waiting.state(), DownloadState::Queued);
    assert_eq!(queue.queued_items().len(), 1);

    queue.cancel_all().unwrap();

    wait_for_state(&running, DownloadState::Downloadable).await;
    assert_eq!(waiting.state(), DownloadState::Downloadable);
    assert!(queue.queued_items().is_empty());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(puller.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_request_can_be_resubmitted() {
    let puller = ScriptedPuller::with_scripts(vec![
        Err(DownloadError::api(500, "internal error")),
        Ok(success_script()),
    ]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let request = DownloadRequest::shared("deepseek-r1:7b");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Failed).await;

    request.reset();
    assert_eq!(request.state(), DownloadState::Downloadable);
    assert_eq!(request.status().message, None);

    let mut rx = request.subscribe();
    queue.enqueue(Arc::clone(&request)).unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.status.state == DownloadState::Downloading),
    )
    .await
    .unwrap()
    .unwrap();
    wait_for_state(&request, DownloadState::Downloaded).await;
    assert_eq!(puller.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_request_can_be_resubmitted_after_cancel() {
    let puller = ScriptedPuller::with_scripts(vec![
        Err(DownloadError::api(500, "internal error")),
        Ok(success_script()),
    ]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let request = DownloadRequest::shared("mistral-nemo");

    queue.enqueue(Arc::clone(&request)).unwrap();
    wait_for_state(&request, DownloadState::Failed).await;

    request.cancel();
    assert!(!request.cancellation().is_cancelled());

    let mut rx = request.subscribe();
    queue.enqueue(Arc::clone(&request)).unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.status.state == DownloadState::Downloading),
    )
    .await
    .unwrap()
    .unwrap();
    wait_for_state(&request, DownloadState::Downloaded).await;
    assert_eq!(puller.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_discarded_by_cancel_all_can_be_resubmitted() {
    let puller = ScriptedPuller::with_scripts(vec![
        Ok(vec![
            Step::Chunk(PullChunk::progress("pulling", 1, 10)),
            Step::Hang,
        ]),
        Ok(success_script()),
    ]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let running = DownloadRequest::shared("llava");
    let waiting = DownloadRequest::shared("nomic-embed-text");

    queue.enqueue(Arc::clone(&running)).unwrap();
    queue.enqueue(Arc::clone(&waiting)).unwrap();
    wait_for_state(&running, DownloadState::Downloading).await;

    waiting.cancel();
    queue.cancel_all().unwrap();
    wait_for_state(&running, DownloadState::Downloadable).await;
    assert_eq!(waiting.state(), DownloadState::Downloadable);
    assert!(!waiting.cancellation().is_cancelled());

    let mut rx = waiting.subscribe();
    queue.enqueue(Arc::clone(&waiting)).unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.status.state == DownloadState::Downloading),
    )
    .await
    .unwrap()
    .unwrap();
    wait_for_state(&waiting, DownloadState::Downloaded).await;
    assert_eq!(puller.calls(), 2);

    queue.dispose().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_dropped_by_dispose_is_reset_with_live_handle() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![
        Step::Chunk(PullChunk::progress("pulling", 1, 10)),
        Step::Hang,
    ])]);
    let queue = build_queue(FakeNetwork::up(), Arc::clone(&puller), 1);
    let running = DownloadRequest::shared("qwen2.5-coder");
    let waiting = DownloadRequest::shared("all-minilm");

    queue.enqueue(Arc::clone(&running)).unwrap();
    wait_for_state(&running, DownloadState::Downloading).await;
    queue.enqueue(Arc::clone(&waiting)).unwrap();
    waiting.cancel();

    queue.dispose().await.unwrap();

    assert_eq!(running.state(), DownloadState::Downloadable);
    assert_eq!(waiting.state(), DownloadState::Downloadable);
    assert!(!waiting.cancellation().is_cancelled());
    assert_eq!(puller.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_enqueue_keeps_previous_status() {
    let puller = ScriptedPuller::with_scripts(vec![Ok(vec![Step::Hang])]);
    let processor = ModelPullProcessor::new(
        FakeNetwork::up(),
        puller,
        Arc::new(EnglishCatalog),
    );
    let queue = DownloadQueue::new(
        processor,
        QueueConfig::default()
            .with_max_parallelism(1)
            .with_capacity(Some(1)),
    );

    let first = DownloadRequest::shared("a");
    queue.enqueue(Arc::clone(&first)).unwrap();
    let mut rx = first.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| p.part_count == 1))
        .await
        .unwrap()
        .unwrap();

    let second = DownloadRequest::shared("b");
    queue.enqueue(Arc::clone(&second)).unwrap();

    let third = DownloadRequest::shared("c");
    assert!(queue.enqueue(Arc::clone(&third)).is_err());
    assert_eq!(third.state(), DownloadState::Downloadable);

    queue.dispose().await.unwrap();
    assert_eq!(second.state(), DownloadState::Downloadable);
}
