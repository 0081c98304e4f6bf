//! Core application logic for the fetch registry
//!
//! This module contains the registry, the per-URL content handles, the
//! transfer tasks that fill them, the HTTP transport and temporary storage.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fetch_registry::app::{ContentEvent, ContentRegistry, FetchMode, RegistryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ContentRegistry::new(RegistryConfig::default())?;
//!
//! // Register first, subscribe, then start the transfer
//! let content = registry.fetch("https://example.com/tiles/3/4/2.png", FetchMode::DownloadLater)?;
//! let mut events = content.subscribe();
//! content.download(false);
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ContentEvent::Progress { received, total } => {
//!             println!("{} of {:?} bytes", received, total);
//!         }
//!         ContentEvent::Fetched { status } => {
//!             println!("Done: {}", status);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod content;
pub mod registry;
pub mod storage;
pub mod task;


// Re-export main public API
pub use client::{ByteStream, ClientConfig, HttpTransport, Transport};
pub use content::{ContentEvent, ContentState, ContentStatus, FetchedContent};
pub use registry::{ContentRegistry, FetchMode, RegistryConfig, RegistryStats};
pub use storage::{StorageAllocator, TempStorage};
pub use task::TaskOutcome;
