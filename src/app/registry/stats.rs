//! Registry statistics

use std::path::PathBuf;

use serde::Serialize;

use crate::app::content::ContentStatus;

/// Snapshot of what the registry holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Private storage directory
    pub storage_root: PathBuf,
    /// Registered URLs
    pub total_entries: usize,
    /// Entries never asked to download
    pub not_started: usize,
    /// Entries with a running transfer
    pub downloading: usize,
    /// Entries with cached bytes
    pub finished: usize,
    /// Entries whose last attempt failed
    pub failed: usize,
    /// Total size of cached bytes
    pub cached_bytes: u64,
}

impl RegistryStats {
    /// Create empty statistics
    pub fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            total_entries: 0,
            not_started: 0,
            downloading: 0,
            finished: 0,
            failed: 0,
            cached_bytes: 0,
        }
    }

    /// Count one entry
    pub fn record(&mut self, status: ContentStatus, cached_bytes: u64) {
        self.total_entries += 1;
        match status {
            ContentStatus::NotStarted => self.not_started += 1,
            ContentStatus::Downloading => self.downloading += 1,
            ContentStatus::Finished => self.finished += 1,
            ContentStatus::Failed => self.failed += 1,
        }
        self.cached_bytes += cached_bytes;
    }

    /// Share of settled entries that finished, in percent
    pub fn success_rate(&self) -> f64 {
        let settled = self.finished + self.failed;
        if settled == 0 {
            return 100.0;
        }
        (self.finished as f64 / settled as f64) * 100.0
    }

    /// Format cached size in human-readable format
    pub fn format_cached_size(&self) -> String {
        format_bytes(self.cached_bytes)
    }
}

/// Format a byte count in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
