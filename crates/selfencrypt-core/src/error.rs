//! Error types for the selfencrypt-core crate

use selfencrypt_crypto::CryptoError;
use selfencrypt_store::StoreError;
use thiserror::Error;

/// Result type alias using `EngineError`
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during self-encryption engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// `read`/`truncate` position or length does not fit the logical file,
    /// or `write`'s `bytes.len()` does not fit a `u32`.
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// A chunk index computed internally (e.g. during neighbor derivation)
    /// fell outside `0..N`. Indicates a programming defect, not caller error.
    #[error("invalid chunk index: {0}")]
    InvalidChunkIndex(usize),

    /// A decrypted chunk's SHA-512 did not match its recorded pre-hash, or
    /// an encrypted data map's version prefix was not recognized.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// The sequencer's internal interval map could not accept or coalesce
    /// an entry.
    #[error("sequencer error: {0}")]
    Sequencer(String),

    /// A chunk store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A cryptographic primitive failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Wire-format serialization or deserialization of a data map failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Stable numeric code matching the reference implementation's error table.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::InvalidChunkIndex(_) => -200001,
            EngineError::Store(e) => e.code(),
            EngineError::Crypto(e) => e.code(),
            EngineError::InvalidPosition(_) => -200006,
            EngineError::Sequencer(_) => -200007,
            EngineError::Corrupt(_) => -200005,
            EngineError::Serialization(_) => -200005,
        }
    }
}
