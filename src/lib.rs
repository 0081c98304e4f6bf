//! Fetch Registry Library
//!
//! A process-wide registry of content fetched over HTTP. Each URL is
//! downloaded at most once into temporary storage and shared by every caller
//! that asks for it; callers observe progress and completion asynchronously.

pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
