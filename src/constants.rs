//! Application constants for the fetch registry
//!
//! This module centralizes the defaults used throughout the crate,
//! organized by functional domain.

use std::time::Duration;

/// HTTP transport defaults
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("fetch-registry/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// Default outgoing request rate (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;

    /// URL schemes the registry can fetch
    pub const FETCHABLE_SCHEMES: &[&str] = &["http", "https"];
}

/// Temporary storage defaults
pub mod storage {
    /// Directory prefix for the registry's temporary directory
    pub const DIR_PREFIX: &str = "fetch-registry-";

    /// File name prefix for fetched content
    pub const FILE_PREFIX: &str = "content-";
}

/// Notification channel defaults
pub mod events {
    /// Buffered events per content before slow subscribers start lagging
    pub const DEFAULT_EVENT_CAPACITY: usize = 64;

    /// Bytes between two progress events
    pub const DEFAULT_PROGRESS_INTERVAL_BYTES: u64 = 256 * 1024;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "./fetch-registry.toml";

    /// Directory name under the user config directory
    pub const CONFIG_DIR_NAME: &str = "fetch-registry";

    /// Configuration file name under the user config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

pub use events::{DEFAULT_EVENT_CAPACITY, DEFAULT_PROGRESS_INTERVAL_BYTES};
pub use http::{DEFAULT_RATE_LIMIT_RPS, USER_AGENT};
