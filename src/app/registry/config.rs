//! Registry configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::client::ClientConfig;
use crate::constants::{events, storage};

/// When `fetch` starts the transfer of a newly registered URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchMode {
    /// Register only; the caller subscribes first, then calls `download`
    #[default]
    DownloadLater,
    /// Start the transfer right away if the URL was not registered yet
    DownloadImmediately,
}

/// Configuration for the content registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory under which the private storage directory is created
    /// (system temporary directory if None)
    pub storage_root: Option<PathBuf>,
    /// File name prefix of temporary files
    pub file_prefix: String,
    /// Buffered notifications per content
    pub event_capacity: usize,
    /// Bytes between two progress notifications
    pub progress_interval_bytes: u64,
    /// HTTP transport settings
    pub client: ClientConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            file_prefix: storage::FILE_PREFIX.to_string(),
            event_capacity: events::DEFAULT_EVENT_CAPACITY,
            progress_interval_bytes: events::DEFAULT_PROGRESS_INTERVAL_BYTES,
            client: ClientConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a configuration storing content under `storage_root`
    pub fn with_storage_root(storage_root: PathBuf) -> Self {
        Self {
            storage_root: Some(storage_root),
            ..Default::default()
        }
    }

    /// Set the temporary file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Set the notification buffer size
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the progress notification interval
    pub fn with_progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval_bytes = bytes;
        self
    }

    /// Set the HTTP transport settings
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }
}
