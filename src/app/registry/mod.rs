//! Content registry with per-URL deduplication
//!
//! The registry lets independent parts of an application ask for the same
//! remote resource without downloading it twice, and resolve either a local
//! path or a previously fetched URL to a usable local file.
//!
//! # Key Features
//!
//! - **Deduplication**: at most one [`FetchedContent`](crate::app::FetchedContent) per canonical URL
//! - **Non-blocking**: `fetch` returns at once; transfers run on the tokio runtime
//! - **Observable**: every content publishes its state and notifications
//! - **Temporary storage**: cached bytes live for the lifetime of the registry
//!
//! # Module Organization
//!
//! - [`config`] - Configuration types and defaults
//! - [`manager`] - The registry itself
//! - [`resolve`] - URL canonicalization and path classification
//! - [`stats`] - Registry statistics
//!
//! # Examples
//!
//! ```rust,no_run
//! use fetch_registry::app::registry::{ContentRegistry, FetchMode, RegistryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ContentRegistry::new(RegistryConfig::default())?;
//!
//! let content = registry.fetch("https://example.com/style.qml", FetchMode::DownloadImmediately)?;
//! content.wait_fetched().await;
//!
//! // Either a local path or the cached copy of a fetched URL
//! let path = registry.local_path("https://example.com/style.qml");
//! let same = registry.local_path("/etc/hosts");
//! assert_eq!(same, "/etc/hosts");
//! # let _ = path;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod resolve;
pub mod stats;

#[cfg(test)]
mod tests;

// Re-export main public API
pub use config::{FetchMode, RegistryConfig};
pub use manager::ContentRegistry;
pub use stats::RegistryStats;
