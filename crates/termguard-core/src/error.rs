//! Error types for the core
//!
//! Transport and configuration failures ride on `anyhow` at the channel and
//! store boundaries, matching the crates they come from; `CoreError` covers
//! the two classes the core itself produces. Neither is fatal: persistence
//! errors surface to the requester, collection errors are absorbed by the
//! monitor loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("metric collection error: {0}")]
    Collection(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
