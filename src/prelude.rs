//! Prelude module for the fetch registry
//!
//! Re-exports the items most integrations need, so a single
//! `use fetch_registry::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fetch_registry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?.to_runtime_config();
//!     let registry = Arc::new(ContentRegistry::new(config)?);
//!
//!     let content = registry.fetch("https://example.com/data.csv", FetchMode::DownloadImmediately)?;
//!     if content.wait_fetched().await == ContentStatus::Finished {
//!         println!("{}", registry.local_path("https://example.com/data.csv"));
//!     }
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, FetchError, Result};

// Registry and content handles
pub use crate::app::{
    ContentEvent, ContentRegistry, ContentState, ContentStatus, FetchMode, FetchedContent,
    RegistryConfig, RegistryStats,
};

// Transport seam
pub use crate::app::{ByteStream, ClientConfig, HttpTransport, Transport};

// File configuration
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
