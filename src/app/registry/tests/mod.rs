//! Behaviour tests for the content registry
//!
//! These run the full fetch/cancel/redownload protocol against an in-memory
//! transport, so they exercise the real task runner and temporary storage
//! without touching the network.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::timeout;

use crate::app::content::{ContentEvent, ContentStatus, FetchedContent};
use crate::app::registry::{ContentRegistry, FetchMode, RegistryConfig};
use crate::app::test_utils::ScriptedTransport;
use crate::errors::{AppError, FetchError, RegistryError};

const FILE_URL: &str = "http://x/file";
const BAD_URL: &str = "http://x/bad";
const SLOW_URL: &str = "http://x/slow";

fn create_registry(transport: &Arc<ScriptedTransport>) -> (ContentRegistry, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = RegistryConfig::with_storage_root(temp_dir.path().to_path_buf());
    let registry = ContentRegistry::with_transport(config, transport.clone()).unwrap();
    (registry, temp_dir)
}

fn file_transport() -> Arc<ScriptedTransport> {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(FILE_URL, b"remote file body".to_vec());
    transport.fail(BAD_URL, FetchError::ServerError { status: 500 });
    transport.hang(SLOW_URL);
    transport
}

async fn settle(content: &FetchedContent) -> ContentStatus {
    timeout(Duration::from_secs(5), content.wait_fetched())
        .await
        .expect("fetch did not settle in time")
}

fn drain(events: &mut Receiver<ContentEvent>) -> Vec<ContentEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return seen,
        }
    }
}

fn read_all(content: &FetchedContent) -> Vec<u8> {
    let mut bytes = Vec::new();
    content
        .file()
        .expect("content should be readable")
        .read_to_end(&mut bytes)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_immediate_fetch_finishes() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    assert_eq!(content.status(), ContentStatus::Downloading);

    assert_eq!(settle(&content).await, ContentStatus::Finished);
    assert!(content.error().is_none());

    let path = content.file_path().unwrap();
    assert!(path.starts_with(registry.storage_root()));
    assert_eq!(read_all(&content), b"remote file body");
    assert_eq!(content.state().bytes_received, 16);

    let local = registry.local_path(FILE_URL);
    assert!(!local.is_empty());
    assert_ne!(local, FILE_URL);
    assert_eq!(local, path.to_string_lossy());
}

#[tokio::test]
async fn test_failed_fetch_records_error() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();

    assert_eq!(settle(&content).await, ContentStatus::Failed);
    assert_eq!(content.error(), Some(FetchError::ServerError { status: 500 }));
    assert!(content.file_path().is_none());
    assert!(content.file().is_none());
    assert_eq!(registry.local_path(BAD_URL), "");
    assert!(registry.local_file(BAD_URL).is_none());
}

#[tokio::test]
async fn test_download_later_waits_for_explicit_start() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    assert_eq!(content.status(), ContentStatus::NotStarted);
    assert!(content.file_path().is_none());
    assert!(content.error().is_none());

    tokio::task::yield_now().await;
    assert_eq!(transport.total_requests(), 0);

    content.download(false);
    assert_eq!(content.status(), ContentStatus::Downloading);

    assert_eq!(settle(&content).await, ContentStatus::Finished);
    assert_eq!(transport.requests(FILE_URL), 1);
}

#[tokio::test]
async fn test_redownload_replaces_finished_content() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    settle(&content).await;
    let first_path = content.file_path().unwrap();

    content.download(true);
    assert_eq!(content.status(), ContentStatus::Downloading);
    assert!(content.file_path().is_none());
    assert_eq!(registry.local_path(FILE_URL), "");

    assert_eq!(settle(&content).await, ContentStatus::Finished);
    let second_path = content.file_path().unwrap();

    assert_ne!(first_path, second_path);
    assert!(!first_path.exists());
    assert_eq!(read_all(&content), b"remote file body");
    assert_eq!(transport.requests(FILE_URL), 2);
    assert_eq!(content.state().attempts, 2);
}

#[tokio::test]
async fn test_same_url_returns_same_instance() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let first = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let second = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let third = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(registry.len(), 1);

    settle(&first).await;
    assert_eq!(transport.requests(FILE_URL), 1);
}

#[tokio::test]
async fn test_equivalent_urls_share_content() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let plain = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    let noisy = registry
        .fetch("HTTP://X:80/dir/../file#part", FetchMode::DownloadLater)
        .unwrap();

    assert!(Arc::ptr_eq(&plain, &noisy));
    assert_eq!(plain.url().as_str(), FILE_URL);
    assert!(registry.contains("http://X/file"));
}

#[tokio::test]
async fn test_immediate_fetch_does_not_retry_failed_entry() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();
    settle(&content).await;

    let again = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();
    tokio::task::yield_now().await;

    assert!(Arc::ptr_eq(&content, &again));
    assert_eq!(again.status(), ContentStatus::Failed);
    assert_eq!(transport.requests(BAD_URL), 1);
}

#[tokio::test]
async fn test_download_retries_failed_entry() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();
    assert_eq!(settle(&content).await, ContentStatus::Failed);

    transport.respond(BAD_URL, b"recovered".to_vec());
    content.download(false);
    assert_eq!(content.status(), ContentStatus::Downloading);
    assert!(content.error().is_none());

    assert_eq!(settle(&content).await, ContentStatus::Finished);
    assert_eq!(read_all(&content), b"recovered");
    assert_eq!(content.state().attempts, 2);
}

#[tokio::test]
async fn test_download_without_redownload_is_noop_when_finished() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    settle(&content).await;
    let path = content.file_path();

    let mut events = content.subscribe();
    content.download(false);
    tokio::task::yield_now().await;

    assert_eq!(content.status(), ContentStatus::Finished);
    assert_eq!(content.file_path(), path);
    assert_eq!(transport.requests(FILE_URL), 1);
    assert_eq!(
        drain(&mut events),
        vec![ContentEvent::DownloadStarted { redownload: false }]
    );
}

#[tokio::test]
async fn test_event_order_on_success() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    let mut events = content.subscribe();
    content.download(false);
    settle(&content).await;

    let seen = drain(&mut events);
    assert_eq!(
        seen.first(),
        Some(&ContentEvent::DownloadStarted { redownload: false })
    );
    assert!(seen.contains(&ContentEvent::Progress {
        received: 16,
        total: Some(16)
    }));

    let completed = seen
        .iter()
        .position(|e| *e == ContentEvent::TaskCompleted)
        .unwrap();
    let fetched = seen
        .iter()
        .position(|e| {
            *e == ContentEvent::Fetched {
                status: ContentStatus::Finished,
            }
        })
        .unwrap();
    assert!(completed < fetched);
    assert_eq!(fetched, seen.len() - 1);
}

#[tokio::test]
async fn test_cancel_without_task_is_noop() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    let mut events = content.subscribe();

    content.cancel();
    tokio::task::yield_now().await;

    assert_eq!(content.status(), ContentStatus::NotStarted);
    assert!(content.error().is_none());
    assert_eq!(drain(&mut events), vec![ContentEvent::CancelTriggered]);

    // Finished content has no task either
    let done = registry
        .fetch("http://x/file?copy=1", FetchMode::DownloadLater)
        .unwrap();
    transport.respond("http://x/file?copy=1", b"copy".to_vec());
    done.download(false);
    settle(&done).await;
    done.cancel();
    tokio::task::yield_now().await;
    assert_eq!(done.status(), ContentStatus::Finished);
}

#[tokio::test]
async fn test_cancel_running_transfer() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(SLOW_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let mut events = content.subscribe();

    // Let the transfer reach the transport
    tokio::task::yield_now().await;
    content.cancel();

    assert_eq!(settle(&content).await, ContentStatus::Failed);
    assert_eq!(content.error(), Some(FetchError::Cancelled));
    assert!(content.file_path().is_none());

    assert_eq!(
        drain(&mut events),
        vec![
            ContentEvent::CancelTriggered,
            ContentEvent::TaskCompleted,
            ContentEvent::Fetched {
                status: ContentStatus::Failed
            },
        ]
    );
}

#[tokio::test]
async fn test_redownload_supersedes_running_transfer() {
    let transport = Arc::new(ScriptedTransport::new());
    let gate = transport.gate(FILE_URL, b"gated body".to_vec());
    let (registry, _dir) = create_registry(&transport);

    let content = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    tokio::task::yield_now().await;

    let mut events = content.subscribe();
    content.download(true);
    assert_eq!(content.status(), ContentStatus::Downloading);

    gate.add_permits(2);
    assert_eq!(settle(&content).await, ContentStatus::Finished);
    assert_eq!(read_all(&content), b"gated body");
    assert_eq!(content.state().attempts, 2);

    // Only the surviving attempt reports back
    let seen = drain(&mut events);
    let completions = seen
        .iter()
        .filter(|e| **e == ContentEvent::TaskCompleted)
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_file_path_set_only_when_finished() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_chunks(
        FILE_URL,
        (0..8).map(|_| bytes::Bytes::from(vec![7u8; 32])).collect(),
    );
    let temp_dir = TempDir::new().unwrap();
    let config = RegistryConfig::with_storage_root(temp_dir.path().to_path_buf())
        .with_progress_interval(32);
    let registry = ContentRegistry::with_transport(config, transport.clone()).unwrap();

    let content = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    let mut watch = content.watch();
    content.download(false);

    let mut previous = ContentStatus::NotStarted;
    loop {
        let state = watch.borrow_and_update().clone();
        assert_eq!(state.file_path.is_some(), state.is_finished());
        assert_eq!(state.error.is_some(), state.is_failed());
        assert!(
            previous == state.status || previous.can_transition_to(state.status, false),
            "illegal transition {:?} -> {:?}",
            previous,
            state.status
        );
        previous = state.status;

        if state.status.is_terminal() {
            break;
        }
        timeout(Duration::from_secs(5), watch.changed())
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(previous, ContentStatus::Finished);
    assert_eq!(content.state().bytes_received, 256);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetch_single_transfer() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);
    let registry = Arc::new(registry);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .fetch(FILE_URL, FetchMode::DownloadImmediately)
                .unwrap()
        }));
    }

    let mut contents = Vec::new();
    for handle in handles {
        contents.push(handle.await.unwrap());
    }

    let first = &contents[0];
    assert!(contents.iter().all(|c| Arc::ptr_eq(c, first)));
    assert_eq!(settle(first).await, ContentStatus::Finished);
    assert_eq!(transport.requests(FILE_URL), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_from_plain_threads() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let contents: Vec<Arc<FetchedContent>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    registry
                        .fetch(FILE_URL, FetchMode::DownloadImmediately)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(contents.iter().all(|c| Arc::ptr_eq(c, &contents[0])));
    assert_eq!(settle(&contents[0]).await, ContentStatus::Finished);
    assert_eq!(transport.requests(FILE_URL), 1);
}

#[tokio::test]
async fn test_failure_is_isolated_per_url() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let bad = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let good = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();

    assert_eq!(settle(&bad).await, ContentStatus::Failed);
    assert_eq!(settle(&good).await, ContentStatus::Finished);
}

#[tokio::test]
async fn test_local_path_resolution() {
    let transport = file_transport();
    let (registry, dir) = create_registry(&transport);

    // Plain paths and unknown URLs come back unchanged
    assert_eq!(registry.local_path("/var/data/a.tif"), "/var/data/a.tif");
    assert_eq!(registry.local_path("relative/b.tif"), "relative/b.tif");
    assert_eq!(
        registry.local_path("http://x/never-fetched"),
        "http://x/never-fetched"
    );

    // Registered but unfinished URLs resolve to nothing
    registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    assert_eq!(registry.local_path(FILE_URL), "");

    let local = dir.path().join("local.txt");
    std::fs::write(&local, b"on disk").unwrap();
    let local = local.to_string_lossy().into_owned();
    assert_eq!(registry.local_path(&local), local);
}

#[tokio::test]
async fn test_local_file_resolution() {
    let transport = file_transport();
    let (registry, dir) = create_registry(&transport);

    let local = dir.path().join("local.txt");
    std::fs::write(&local, b"on disk").unwrap();

    let mut text = String::new();
    registry
        .local_file(&local.to_string_lossy())
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "on disk");

    let file_url = url::Url::from_file_path(&local).unwrap();
    assert!(registry.local_file(file_url.as_str()).is_some());
    assert_eq!(registry.local_path(file_url.as_str()), file_url.as_str());

    assert!(registry
        .local_file(&dir.path().join("missing.txt").to_string_lossy())
        .is_none());
    assert!(registry.local_file(&dir.path().to_string_lossy()).is_none());
    assert!(registry.local_file("http://x/never-fetched").is_none());

    let content = registry.fetch(FILE_URL, FetchMode::DownloadLater).unwrap();
    assert!(registry.local_file(FILE_URL).is_none());

    content.download(false);
    settle(&content).await;
    let mut bytes = Vec::new();
    registry
        .local_file(FILE_URL)
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert_eq!(bytes, b"remote file body");
}

#[tokio::test]
async fn test_fetch_rejects_non_http_urls() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let err = registry
        .fetch("not a url", FetchMode::DownloadImmediately)
        .unwrap_err();
    assert!(matches!(err, AppError::Registry(RegistryError::InvalidUrl { .. })));

    let err = registry
        .fetch("ftp://x/file", FetchMode::DownloadImmediately)
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Registry(RegistryError::UnsupportedScheme { .. })
    ));

    assert!(registry.is_empty());
    assert!(registry.get("ftp://x/file").is_none());
}

#[tokio::test]
async fn test_stats_and_urls() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let done = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let failed = registry
        .fetch(BAD_URL, FetchMode::DownloadImmediately)
        .unwrap();
    registry
        .fetch("http://x/later", FetchMode::DownloadLater)
        .unwrap();
    settle(&done).await;
    settle(&failed).await;

    let stats = registry.stats();
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.not_started, 1);
    assert_eq!(stats.downloading, 0);
    assert_eq!(stats.cached_bytes, 16);
    assert_eq!(stats.storage_root, registry.storage_root());

    let mut urls: Vec<String> = registry.urls().iter().map(|u| u.to_string()).collect();
    urls.sort();
    assert_eq!(urls, vec![BAD_URL, FILE_URL, "http://x/later"]);
}

#[tokio::test]
async fn test_cancel_all() {
    let transport = file_transport();
    transport.hang("http://x/slow2");
    let (registry, _dir) = create_registry(&transport);

    let a = registry
        .fetch(SLOW_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let b = registry
        .fetch("http://x/slow2", FetchMode::DownloadImmediately)
        .unwrap();

    registry.cancel_all();

    assert_eq!(settle(&a).await, ContentStatus::Failed);
    assert_eq!(settle(&b).await, ContentStatus::Failed);
    assert!(a.error().unwrap().is_cancelled());
    assert!(b.error().unwrap().is_cancelled());
}

#[tokio::test]
async fn test_drop_releases_storage() {
    let transport = file_transport();
    let (registry, _dir) = create_registry(&transport);

    let done = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    settle(&done).await;
    let cached = done.file_path().unwrap();
    let root = registry.storage_root().to_path_buf();
    assert!(cached.exists());

    drop(done);
    drop(registry);

    assert!(!cached.exists());
    assert!(!root.exists());
}

#[test]
fn test_registry_requires_runtime() {
    let transport = file_transport();
    let temp_dir = TempDir::new().unwrap();
    let config = RegistryConfig::with_storage_root(temp_dir.path().to_path_buf());

    let result = ContentRegistry::with_transport(config, transport);
    tokio_test::assert_err!(&result);
    assert!(matches!(
        result,
        Err(AppError::Registry(RegistryError::NoRuntime))
    ));
}

#[test]
fn test_registry_with_explicit_runtime() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transport = file_transport();
    let temp_dir = TempDir::new().unwrap();
    let config = RegistryConfig::with_storage_root(temp_dir.path().to_path_buf());

    let registry =
        ContentRegistry::with_runtime(config, transport.clone(), runtime.handle().clone()).unwrap();

    let content = registry
        .fetch(FILE_URL, FetchMode::DownloadImmediately)
        .unwrap();
    let status = runtime.block_on(settle(&content));

    assert_eq!(status, ContentStatus::Finished);
    assert_eq!(read_all(&content), b"remote file body");
}
