//! Download state of a single fetched URL
//!
//! Holds the status machine and the notifications emitted by a
//! `FetchedContent`. Transitions are applied through the `mark_*` methods,
//! which keep the "file path is set iff finished" invariant in one place.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// Status of fetched content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentStatus {
    /// No download started for this URL
    NotStarted,
    /// Currently downloading
    Downloading,
    /// Download finished and successful
    Finished,
    /// Download failed or was cancelled
    Failed,
}

impl ContentStatus {
    /// Finished or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, ContentStatus::Finished | ContentStatus::Failed)
    }

    /// Check whether moving from `self` to `next` is a legal transition
    ///
    /// Downloading can be re-entered from any state through a redownload.
    pub fn can_transition_to(self, next: ContentStatus, redownload: bool) -> bool {
        use ContentStatus::*;
        match (self, next) {
            (NotStarted, Downloading) => true,
            (Failed, Downloading) => true,
            (Downloading, Finished) | (Downloading, Failed) => true,
            (Finished, Downloading) | (Downloading, Downloading) => redownload,
            _ => false,
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentStatus::NotStarted => "not started",
            ContentStatus::Downloading => "downloading",
            ContentStatus::Finished => "finished",
            ContentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of a fetched content's state
#[derive(Debug, Clone, PartialEq)]
pub struct ContentState {
    /// Current status
    pub status: ContentStatus,
    /// Path of the cached bytes, only while finished
    pub file_path: Option<PathBuf>,
    /// Error of the last attempt, only while failed
    pub error: Option<FetchError>,
    /// Bytes written by the current or last attempt
    pub bytes_received: u64,
    /// Length announced by the server for the current or last attempt
    pub content_length: Option<u64>,
    /// Number of transfer attempts started so far
    pub attempts: u32,
    /// When the state last changed
    pub updated_at: DateTime<Utc>,
}

impl Default for ContentState {
    fn default() -> Self {
        Self {
            status: ContentStatus::NotStarted,
            file_path: None,
            error: None,
            bytes_received: 0,
            content_length: None,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }
}

impl ContentState {
    /// Mark a new attempt as downloading, discarding any previous result
    pub fn mark_downloading(&mut self) {
        self.status = ContentStatus::Downloading;
        self.file_path = None;
        self.error = None;
        self.bytes_received = 0;
        self.content_length = None;
        self.attempts += 1;
        self.touch();
    }

    /// Record transfer progress
    pub fn mark_progress(&mut self, received: u64, total: Option<u64>) {
        self.bytes_received = received;
        self.content_length = total;
    }

    /// Mark the attempt as completed successfully
    pub fn mark_finished(&mut self, file_path: PathBuf, bytes: u64) {
        self.status = ContentStatus::Finished;
        self.file_path = Some(file_path);
        self.error = None;
        self.bytes_received = bytes;
        self.touch();
    }

    /// Mark the attempt as failed
    pub fn mark_failed(&mut self, error: FetchError) {
        self.status = ContentStatus::Failed;
        self.file_path = None;
        self.error = Some(error);
        self.touch();
    }

    /// Check if the content is downloading
    pub fn is_downloading(&self) -> bool {
        self.status == ContentStatus::Downloading
    }

    /// Check if the content is finished
    pub fn is_finished(&self) -> bool {
        self.status == ContentStatus::Finished
    }

    /// Check if the content failed
    pub fn is_failed(&self) -> bool {
        self.status == ContentStatus::Failed
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Notifications emitted by a fetched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    /// `download()` was called; emitted even when nothing is started
    DownloadStarted { redownload: bool },
    /// `cancel()` was called
    CancelTriggered,
    /// Bytes were written by the running attempt
    Progress { received: u64, total: Option<u64> },
    /// The transfer task reported back; the file may not be readable yet
    TaskCompleted,
    /// The state settled after a transfer; storage is readable if finished
    Fetched { status: ContentStatus },
}
