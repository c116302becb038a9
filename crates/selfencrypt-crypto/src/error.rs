//! Error types for the selfencrypt-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations.
///
/// `code()` returns the stable cross-language numeric code for the error kinds
/// this crate can raise, so callers that need wire-compatible status codes and
/// callers that just want a readable message both have a direct path.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// AES-256-CFB encryption failed (key/IV length mismatch; infallible otherwise)
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AES-256-CFB decryption failed
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Key or IV was not the required length for the cipher
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Input to the hashing facade did not have the expected length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    /// gzip compression or decompression failed
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    /// Hex decode error, surfaced from `Hash::from_hex`
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl CryptoError {
    /// Stable numeric code matching the reference implementation's error table.
    pub fn code(&self) -> i32 {
        match self {
            CryptoError::Encryption(_) => -200004,
            CryptoError::Decryption(_) => -200005,
            CryptoError::InvalidKey(_)
            | CryptoError::InvalidHashLength { .. }
            | CryptoError::HexDecode(_) => -200006,
            CryptoError::Compression(_) => -200004,
        }
    }
}
