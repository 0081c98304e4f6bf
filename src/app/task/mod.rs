//! Transfer tasks
//!
//! A [`FetchTask`] is one attempt at downloading a URL into temporary storage.
//! It runs on the registry's tokio runtime, races the transfer against its
//! cancellation token and reports exactly one [`TaskOutcome`] back to the
//! content that launched it.

use std::fs::File;
use std::sync::{Arc, Weak};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use url::Url;

use crate::app::client::Transport;
use crate::app::content::FetchedContent;
use crate::app::storage::StorageAllocator;
use crate::errors::{FetchError, FetchResult};

/// How a transfer attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every byte was written and flushed to storage
    Completed { bytes: u64 },
    /// The transport or the storage failed
    Failed(FetchError),
    /// The cancellation token fired before the transfer completed
    Cancelled,
}

/// A single transfer attempt
pub(crate) struct FetchTask {
    url: Url,
    writer: File,
    cancel: CancellationToken,
    transport: Arc<dyn Transport>,
    progress_interval: u64,
}

impl FetchTask {
    /// Run the transfer to completion or cancellation
    ///
    /// `on_progress` is called with `(received, total)` at start, every
    /// `progress_interval` bytes and once more when the body is exhausted.
    pub(crate) async fn run<F>(self, mut on_progress: F) -> TaskOutcome
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let FetchTask {
            url,
            writer,
            cancel,
            transport,
            progress_interval,
        } = self;

        let transfer = stream_to_file(
            transport.as_ref(),
            &url,
            writer,
            progress_interval,
            &mut on_progress,
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transfer cancelled");
                TaskOutcome::Cancelled
            }
            result = transfer => match result {
                Ok(bytes) => TaskOutcome::Completed { bytes },
                Err(e) => TaskOutcome::Failed(e),
            },
        }
    }
}

async fn stream_to_file<F>(
    transport: &dyn Transport,
    url: &Url,
    writer: File,
    progress_interval: u64,
    on_progress: &mut F,
) -> FetchResult<u64>
where
    F: FnMut(u64, Option<u64>) + Send,
{
    let mut body = transport.get(url).await?;
    let total = body.content_length();
    let mut file = tokio::fs::File::from_std(writer);
    let mut received = 0u64;
    let mut last_reported = 0u64;

    on_progress(0, total);

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;

        if received - last_reported >= progress_interval {
            on_progress(received, total);
            last_reported = received;
        }
    }

    file.flush().await?;
    file.sync_all().await?;

    if let Some(expected) = total {
        if received < expected {
            return Err(FetchError::Body {
                reason: format!("received {} of {} bytes", received, expected),
            });
        }
    }

    if received != last_reported {
        on_progress(received, total);
    }

    Ok(received)
}

/// Cancellation handle and attempt id of the task currently bound to a content
#[derive(Debug)]
pub(crate) struct ActiveTask {
    pub(crate) attempt: u64,
    pub(crate) cancel: CancellationToken,
}

/// Shared machinery every content uses to start transfers
#[derive(Debug)]
pub(crate) struct TaskRunner {
    transport: Arc<dyn Transport>,
    storage: StorageAllocator,
    runtime: Handle,
    progress_interval: u64,
}

impl TaskRunner {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        storage: StorageAllocator,
        runtime: Handle,
        progress_interval: u64,
    ) -> Self {
        Self {
            transport,
            storage,
            runtime,
            progress_interval: progress_interval.max(1),
        }
    }

    pub(crate) fn storage(&self) -> &StorageAllocator {
        &self.storage
    }

    /// Spawn attempt `attempt` for `content`, writing through `writer`
    ///
    /// The task holds only a weak reference to the content. If the content is
    /// gone by the time the transfer ends, the outcome is dropped.
    pub(crate) fn spawn(
        &self,
        url: Url,
        writer: File,
        attempt: u64,
        content: Weak<FetchedContent>,
    ) -> ActiveTask {
        let cancel = CancellationToken::new();
        let task = FetchTask {
            url: url.clone(),
            writer,
            cancel: cancel.clone(),
            transport: Arc::clone(&self.transport),
            progress_interval: self.progress_interval,
        };

        let progress_target = content.clone();
        let span = tracing::debug_span!("fetch_task", url = %url, attempt);

        self.runtime.spawn(
            async move {
                let outcome = task
                    .run(|received, total| {
                        if let Some(content) = progress_target.upgrade() {
                            content.report_progress(attempt, received, total);
                        }
                    })
                    .await;

                match content.upgrade() {
                    Some(content) => content.complete(attempt, outcome),
                    None => debug!("Content dropped before transfer finished"),
                }
            }
            .instrument(span),
        );

        ActiveTask { attempt, cancel }
    }
}
