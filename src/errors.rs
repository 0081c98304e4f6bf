//! Error types for the fetch registry
//!
//! This module defines the error types for every component of the crate.
//! Transfer errors (`FetchError`) are recorded on the fetched content rather
//! than returned to callers, so they are cheap to clone and compare. The
//! remaining errors surface synchronously from construction and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Classified failure of a single transfer attempt
///
/// Recorded on a `FetchedContent` when its status becomes `Failed` and exposed
/// through `FetchedContent::error()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Could not establish a connection to the remote host
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    /// The transport gave up waiting for the server
    #[error("Request timed out")]
    Timeout,

    /// Server returned a non-success status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Too many redirects or a redirect loop
    #[error("Redirect policy violated: {reason}")]
    Redirect { reason: String },

    /// The response body could not be read to the end
    #[error("Failed to read response body: {reason}")]
    Body { reason: String },

    /// Writing the fetched bytes to temporary storage failed
    #[error("Failed to write fetched content: {reason}")]
    Storage { reason: String },

    /// The transfer was aborted by an explicit cancel request
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Check if the transfer was aborted on request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Check if the failure came from the network transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Connection { .. }
                | FetchError::Timeout
                | FetchError::ServerError { .. }
                | FetchError::Redirect { .. }
                | FetchError::Body { .. }
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = error.status() {
            FetchError::ServerError {
                status: status.as_u16(),
            }
        } else if error.is_redirect() {
            FetchError::Redirect {
                reason: error.to_string(),
            }
        } else if error.is_connect() {
            FetchError::Connection {
                reason: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            FetchError::Body {
                reason: error.to_string(),
            }
        } else {
            FetchError::Connection {
                reason: error.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(error: std::io::Error) -> Self {
        FetchError::Storage {
            reason: error.to_string(),
        }
    }
}

/// Registry lookup and setup errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The string passed to `fetch` is not a URL
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Only http and https URLs can be fetched
    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// The registry was created outside of a tokio runtime
    #[error("No tokio runtime available to run fetch tasks")]
    NoRuntime,
}

/// Temporary storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage root missing and could not be created
    #[error("Storage directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// A temporary file could not be created
    #[error("Failed to allocate temporary storage in {path}: {reason}")]
    AllocationFailed { path: PathBuf, reason: String },
}

/// HTTP client construction errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// reqwest refused the client configuration
    #[error("Failed to build HTTP client")]
    Build(#[from] reqwest::Error),

    /// A zero requests-per-second limit was configured
    #[error("Rate limit must be non-zero")]
    InvalidRateLimit,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Transfer error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// HTTP client error
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Timeout)
            | AppError::Fetch(FetchError::Connection { .. })
            | AppError::Fetch(FetchError::Body { .. })
            | AppError::Fetch(FetchError::Cancelled) => true,

            AppError::Fetch(FetchError::ServerError { status }) => *status >= 500 || *status == 429,

            AppError::Registry(_) | AppError::Client(_) | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Registry(_) => "registry",
            AppError::Storage(_) => "storage",
            AppError::Client(_) => "client",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Transfer result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Registry result type alias
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Client result type alias
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
