//! SHA-512 hashing facade
//!
//! Every hash in the self-encryption wire format is a 64-byte SHA-512 digest:
//! the pre-hash of a plaintext chunk, the post-hash (storage key) of an
//! encrypted chunk, and the encryption/XOR hashes used by the data-map
//! encryptor are all instances of this one type.

use crate::{CryptoError, Result};
use sha2::{Digest, Sha512};
use std::fmt;

/// Size of a SHA-512 digest in bytes.
pub const HASH_BYTE_SIZE: usize = 64;

/// Type alias for raw hash output bytes.
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A SHA-512 hash wrapper with convenience methods.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha512Hash(HashOutput);

impl Sha512Hash {
    /// Create a new hash from bytes.
    pub fn new(bytes: HashOutput) -> Self {
        Self(bytes)
    }

    /// Create a hash from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_BYTE_SIZE {
            return Err(CryptoError::InvalidHashLength {
                expected: HASH_BYTE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; HASH_BYTE_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Create a hash from a byte slice, failing if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HASH_BYTE_SIZE {
            return Err(CryptoError::InvalidHashLength {
                expected: HASH_BYTE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; HASH_BYTE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the hash as bytes.
    pub fn as_bytes(&self) -> &HashOutput {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check if this hash is all zeros (the sentinel "no hash computed yet" value).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Default for Sha512Hash {
    fn default() -> Self {
        Self([0u8; HASH_BYTE_SIZE])
    }
}

impl fmt::Debug for Sha512Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha512Hash({})", self.to_hex())
    }
}

impl fmt::Display for Sha512Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Sha512Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<HashOutput> for Sha512Hash {
    fn from(bytes: HashOutput) -> Self {
        Self(bytes)
    }
}

impl From<Sha512Hash> for HashOutput {
    fn from(hash: Sha512Hash) -> Self {
        hash.0
    }
}

/// A trait for types that can generate hashes. `hash()` below calls
/// `Sha512Hasher` concretely; nothing in this crate is generic over
/// `Hasher` today, but the trait gives a future second algorithm a seam
/// to implement against without changing `Sha512Hash`'s API.
pub trait Hasher {
    /// Generate a hash of the given data.
    fn hash<D: AsRef<[u8]> + ?Sized>(data: &D) -> HashOutput;
}

/// SHA-512 hasher implementation.
pub struct Sha512Hasher;

impl Hasher for Sha512Hasher {
    fn hash<D: AsRef<[u8]> + ?Sized>(data: &D) -> HashOutput {
        let mut hasher = Sha512::new();
        hasher.update(data.as_ref());
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_BYTE_SIZE];
        out.copy_from_slice(&digest);
        out
    }
}

/// An incremental hasher for streaming data, used when a chunk's plaintext
/// arrives in pieces (e.g. drained off the main encrypt queue).
pub struct IncrementalHasher {
    hasher: Sha512,
    bytes_processed: u64,
}

impl IncrementalHasher {
    /// Create a new incremental hasher.
    pub fn new() -> Self {
        Self {
            hasher: Sha512::new(),
            bytes_processed: 0,
        }
    }

    /// Update the hasher with more data.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_processed += data.len() as u64;
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Sha512Hash {
        let digest = self.hasher.finalize();
        let mut out = [0u8; HASH_BYTE_SIZE];
        out.copy_from_slice(&digest);
        Sha512Hash(out)
    }

    /// Get the number of bytes processed so far.
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }
}

impl Default for IncrementalHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash the given data using SHA-512.
pub fn hash(data: &[u8]) -> Sha512Hash {
    Sha512Hasher::hash(data).into()
}

/// Hash the concatenation of two byte slices without an intermediate allocation
/// (used for `SHA512(parent_id || this_id)` and its reverse in the data-map
/// encryptor, and for post-hashing a chunk's `stored_bytes`).
pub fn hash_concat(a: &[u8], b: &[u8]) -> Sha512Hash {
    let mut hasher = IncrementalHasher::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize()
}
