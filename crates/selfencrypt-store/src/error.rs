//! Error types for the selfencrypt-store crate

use selfencrypt_crypto::Sha512Hash;
use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during chunk storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No chunk is stored under this hash.
    #[error("missing chunk: {0}")]
    Missing(Sha512Hash),

    /// The store has no room for another chunk (an in-memory store's
    /// configured capacity, or a disk-backed store's quota).
    #[error("store is full: {0}")]
    StoreFull(String),

    /// The underlying storage medium failed (disk I/O, network I/O, a
    /// corrupted on-disk structure). Blocking storage backends surface their
    /// failures through this variant rather than propagating an async error.
    #[error("store io error: {0}")]
    StoreIo(String),
}

impl StoreError {
    /// Stable numeric code matching the reference implementation's error table.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::Missing(_) => -200003,
            StoreError::StoreFull(_) | StoreError::StoreIo(_) => -200002,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StoreIo(err.to_string())
    }
}
