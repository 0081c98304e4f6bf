//! Fetched content handles
//!
//! A [`FetchedContent`] tracks the download of one URL: its status, the
//! temporary file holding the bytes, and the error of the last attempt. It is
//! created by the registry and shared with every caller that asks for the URL.
//!
//! State is published through a `watch` channel, so reads never block on a
//! running transfer. Notifications go out on a `broadcast` channel; see
//! [`ContentEvent`] for their meaning and order.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fetch_registry::app::{ContentRegistry, ContentStatus, FetchMode, RegistryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ContentRegistry::new(RegistryConfig::default())?;
//! let content = registry.fetch("https://example.com/data.csv", FetchMode::DownloadLater)?;
//!
//! content.download(false);
//!
//! if content.wait_fetched().await == ContentStatus::Finished {
//!     if let Some(path) = content.file_path() {
//!         println!("cached at {}", path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::storage::TempStorage;
use crate::app::task::{ActiveTask, TaskOutcome, TaskRunner};
use crate::errors::FetchError;

pub mod state;

pub use state::{ContentEvent, ContentState, ContentStatus};

/// Download of a single URL, shared between the registry and its callers
pub struct FetchedContent {
    url: Url,
    me: Weak<FetchedContent>,
    state: watch::Sender<ContentState>,
    events: broadcast::Sender<ContentEvent>,
    inner: Mutex<ContentInner>,
    runner: Arc<TaskRunner>,
}

struct ContentInner {
    storage: TempStorage,
    task: Option<ActiveTask>,
    next_attempt: u64,
}

impl FetchedContent {
    pub(crate) fn new(
        url: Url,
        storage: TempStorage,
        runner: Arc<TaskRunner>,
        event_capacity: usize,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(ContentState::default());
        let (events, _) = broadcast::channel(event_capacity.max(1));

        Arc::new_cyclic(|me| Self {
            url,
            me: me.clone(),
            state,
            events,
            inner: Mutex::new(ContentInner {
                storage,
                task: None,
                next_attempt: 1,
            }),
            runner,
        })
    }

    /// Canonical URL of this content
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current status of the download
    pub fn status(&self) -> ContentStatus {
        self.state.borrow().status
    }

    /// Path to the cached bytes, `None` unless the download finished
    pub fn file_path(&self) -> Option<PathBuf> {
        self.state.borrow().file_path.clone()
    }

    /// Open the cached bytes for reading, `None` unless the download finished
    pub fn file(&self) -> Option<File> {
        let path = self.file_path()?;
        File::open(path).ok()
    }

    /// Error of the last attempt, `None` unless the download failed
    pub fn error(&self) -> Option<FetchError> {
        self.state.borrow().error.clone()
    }

    /// Full snapshot of the current state
    pub fn state(&self) -> ContentState {
        self.state.borrow().clone()
    }

    /// Subscribe to notifications emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ContentEvent> {
        self.events.subscribe()
    }

    /// Observe state changes
    ///
    /// Do not keep a `borrow()` guard of the receiver alive while calling
    /// methods on this content.
    pub fn watch(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    /// Wait until the download is finished or failed
    ///
    /// Returns immediately if it already is. Waits forever on content that was
    /// never asked to download.
    pub async fn wait_fetched(&self) -> ContentStatus {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|state| state.status.is_terminal()).await;
        match settled {
            Ok(state) => state.status,
            Err(_) => self.status(),
        }
    }

    /// Start the download
    ///
    /// Without `redownload`, content that is downloading or finished is left
    /// alone. With `redownload`, any result or running transfer is discarded
    /// and a new transfer starts into fresh storage. `DownloadStarted` is
    /// emitted in every case.
    pub fn download(&self, redownload: bool) {
        let _ = self.events.send(ContentEvent::DownloadStarted { redownload });

        let mut inner = self.inner.lock();
        let status = self.status();

        if !redownload && matches!(status, ContentStatus::Downloading | ContentStatus::Finished) {
            debug!(url = %self.url, %status, "Download already {}", status);
            return;
        }

        if let Some(previous) = inner.task.take() {
            debug!(
                url = %self.url,
                attempt = previous.attempt,
                "Superseding running transfer"
            );
            previous.cancel.cancel();
        }

        debug_assert!(status.can_transition_to(ContentStatus::Downloading, redownload));
        let attempt = inner.next_attempt;
        inner.next_attempt += 1;
        self.state.send_modify(|state| state.mark_downloading());

        // The first attempt writes into the storage allocated with the content
        if status != ContentStatus::NotStarted {
            match self.runner.storage().allocate() {
                Ok(storage) => inner.storage = storage,
                Err(e) => {
                    self.fail_to_start(FetchError::Storage {
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        let writer = match inner.storage.open_writer() {
            Ok(writer) => writer,
            Err(e) => {
                self.fail_to_start(FetchError::from(e));
                return;
            }
        };

        debug!(url = %self.url, attempt, redownload, "Starting transfer");
        let task = self
            .runner
            .spawn(self.url.clone(), writer, attempt, self.me.clone());
        inner.task = Some(task);
    }

    /// Request the running transfer to stop
    ///
    /// The content ends up failed with [`FetchError::Cancelled`], or finished
    /// if the transfer completed first. Without a running transfer this only
    /// emits `CancelTriggered`.
    pub fn cancel(&self) {
        let _ = self.events.send(ContentEvent::CancelTriggered);

        let inner = self.inner.lock();
        match &inner.task {
            Some(active) => {
                debug!(url = %self.url, attempt = active.attempt, "Cancelling transfer");
                active.cancel.cancel();
            }
            None => debug!(url = %self.url, "Nothing to cancel"),
        }
    }

    /// Record progress of attempt `attempt`
    pub(crate) fn report_progress(&self, attempt: u64, received: u64, total: Option<u64>) {
        {
            let inner = self.inner.lock();
            if !is_current(&inner, attempt) {
                return;
            }
            self.state
                .send_modify(|state| state.mark_progress(received, total));
        }
        let _ = self.events.send(ContentEvent::Progress { received, total });
    }

    /// Apply the outcome of attempt `attempt`
    ///
    /// Outcomes of superseded attempts are discarded.
    pub(crate) fn complete(&self, attempt: u64, outcome: TaskOutcome) {
        let mut inner = self.inner.lock();
        if !is_current(&inner, attempt) {
            debug!(url = %self.url, attempt, "Discarding outcome of superseded transfer");
            return;
        }
        inner.task = None;

        let _ = self.events.send(ContentEvent::TaskCompleted);

        match outcome {
            TaskOutcome::Completed { bytes } => {
                let path = inner.storage.to_path_buf();
                info!(url = %self.url, bytes, path = %path.display(), "Fetch completed");
                self.state
                    .send_modify(|state| state.mark_finished(path, bytes));
            }
            TaskOutcome::Failed(error) => {
                warn!(url = %self.url, error = %error, "Fetch failed");
                self.state.send_modify(|state| state.mark_failed(error));
            }
            TaskOutcome::Cancelled => {
                info!(url = %self.url, "Fetch cancelled");
                self.state
                    .send_modify(|state| state.mark_failed(FetchError::Cancelled));
            }
        }

        let _ = self.events.send(ContentEvent::Fetched {
            status: self.status(),
        });
    }

    /// Cancel without emitting `CancelTriggered`, used on teardown
    pub(crate) fn abort(&self) {
        if let Some(active) = &self.inner.lock().task {
            active.cancel.cancel();
        }
    }

    /// Size of the cached bytes, 0 unless finished
    pub(crate) fn cached_bytes(&self) -> u64 {
        let state = self.state.borrow();
        if state.is_finished() {
            state.bytes_received
        } else {
            0
        }
    }

    fn fail_to_start(&self, error: FetchError) {
        warn!(url = %self.url, error = %error, "Could not start transfer");
        self.state.send_modify(|state| state.mark_failed(error));
        let _ = self.events.send(ContentEvent::Fetched {
            status: ContentStatus::Failed,
        });
    }
}

fn is_current(inner: &ContentInner, attempt: u64) -> bool {
    matches!(&inner.task, Some(active) if active.attempt == attempt)
}

impl Drop for FetchedContent {
    fn drop(&mut self) {
        if let Some(active) = self.inner.get_mut().task.take() {
            active.cancel.cancel();
        }
    }
}

impl fmt::Debug for FetchedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedContent")
            .field("url", &self.url.as_str())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
