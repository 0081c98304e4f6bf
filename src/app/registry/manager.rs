//! Core content registry
//!
//! Maps canonical URLs to their [`FetchedContent`]. Lookup-or-insert happens
//! under a single lock; a newly inserted entry is only asked to download after
//! the lock is released, so slow transfer setup never blocks other lookups and
//! a racing caller always sees either no entry or the complete one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info};
use url::Url;

use crate::app::client::{HttpTransport, Transport};
use crate::app::content::FetchedContent;
use crate::app::storage::StorageAllocator;
use crate::app::task::TaskRunner;
use crate::errors::{RegistryError, Result};

use super::config::{FetchMode, RegistryConfig};
use super::resolve;
use super::stats::RegistryStats;

/// Registry of content fetched during the lifetime of the process
#[derive(Debug)]
pub struct ContentRegistry {
    /// Configuration
    config: RegistryConfig,
    /// Fetched content by canonical URL
    entries: Mutex<HashMap<Url, Arc<FetchedContent>>>,
    /// Transport, storage and runtime shared with every entry
    runner: Arc<TaskRunner>,
}

impl ContentRegistry {
    /// Create a registry fetching over HTTP with the configured client
    ///
    /// Must be called from within a tokio runtime; transfers run on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, the storage
    /// directory cannot be created, or no runtime is available
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let transport = HttpTransport::with_config(&config.client)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a registry using a custom transport on the current runtime
    pub fn with_transport(config: RegistryConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;
        Self::with_runtime(config, transport, runtime)
    }

    /// Create a registry running transfers on the given runtime
    ///
    /// Unlike the other constructors this one can be called from any thread.
    pub fn with_runtime(
        config: RegistryConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Result<Self> {
        let storage = StorageAllocator::new(config.storage_root.as_deref(), &config.file_prefix)?;

        info!(
            "Initialized content registry with storage: {}",
            storage.root().display()
        );

        let runner = TaskRunner::new(transport, storage, runtime, config.progress_interval_bytes);

        Ok(Self {
            config,
            entries: Mutex::new(HashMap::new()),
            runner: Arc::new(runner),
        })
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Directory holding the temporary files of every entry
    pub fn storage_root(&self) -> &Path {
        self.runner.storage().root()
    }

    /// Register `url` and return its content
    ///
    /// An already registered URL returns the existing content untouched, even
    /// with [`FetchMode::DownloadImmediately`] and even if it failed; call
    /// [`FetchedContent::download`] to retry. A new URL gets fresh storage and,
    /// with `DownloadImmediately`, starts downloading.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an http(s) URL or storage cannot be
    /// allocated. Transfer failures are never reported here.
    pub fn fetch(&self, url: &str, mode: FetchMode) -> Result<Arc<FetchedContent>> {
        let key = resolve::canonicalize(url)?;

        let (content, created) = {
            let mut entries = self.entries.lock();
            match entries.entry(key) {
                Entry::Occupied(entry) => {
                    debug!(url = %entry.key(), "Returning registered content");
                    (Arc::clone(entry.get()), false)
                }
                Entry::Vacant(entry) => {
                    let storage = self.runner.storage().allocate()?;
                    let content = FetchedContent::new(
                        entry.key().clone(),
                        storage,
                        Arc::clone(&self.runner),
                        self.config.event_capacity,
                    );
                    debug!(url = %entry.key(), "Registered new content");
                    entry.insert(Arc::clone(&content));
                    (content, true)
                }
            }
        };

        if created && mode == FetchMode::DownloadImmediately {
            content.download(false);
        }

        Ok(content)
    }

    /// Registered content for `url`, without registering it
    pub fn get(&self, url: &str) -> Option<Arc<FetchedContent>> {
        let key = resolve::remote_url(url)?;
        self.lookup(&key)
    }

    /// Check if `url` is registered
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Number of registered URLs
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing was registered yet
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Canonical URLs of every registered content
    pub fn urls(&self) -> Vec<Url> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Open a local file or the cached bytes of a registered URL
    ///
    /// Returns `None` for a registered URL that has not finished downloading,
    /// and for a path that does not name an existing file.
    pub fn local_file(&self, path_or_url: &str) -> Option<File> {
        if let Some(content) = resolve::remote_url(path_or_url).and_then(|url| self.lookup(&url)) {
            return content.file();
        }

        let path = resolve::local_path(path_or_url);
        let file = File::open(&path).ok()?;
        match file.metadata() {
            Ok(metadata) if metadata.is_file() => Some(file),
            _ => None,
        }
    }

    /// Path to a local file or to the cached bytes of a registered URL
    ///
    /// Anything that is not a registered URL is returned unchanged. A
    /// registered URL resolves to its temporary file, or to an empty string
    /// while it is not finished.
    pub fn local_path(&self, path_or_url: &str) -> String {
        match resolve::remote_url(path_or_url).and_then(|url| self.lookup(&url)) {
            Some(content) => content
                .file_path()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            None => path_or_url.to_string(),
        }
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let contents: Vec<Arc<FetchedContent>> = self.entries.lock().values().cloned().collect();

        let mut stats = RegistryStats::new(self.storage_root().to_path_buf());
        for content in contents {
            stats.record(content.status(), content.cached_bytes());
        }
        stats
    }

    /// Cancel every running transfer
    pub fn cancel_all(&self) {
        let contents: Vec<Arc<FetchedContent>> = self.entries.lock().values().cloned().collect();
        for content in contents {
            content.cancel();
        }
    }

    fn lookup(&self, key: &Url) -> Option<Arc<FetchedContent>> {
        self.entries.lock().get(key).cloned()
    }
}

impl Drop for ContentRegistry {
    fn drop(&mut self) {
        let entries = self.entries.get_mut();
        for content in entries.values() {
            content.abort();
        }
        debug!("Released {} registry entries", entries.len());
    }
}
