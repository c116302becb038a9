//! # Self-Encryption Chunk Store
//!
//! The storage contract the self-encryption engine is written against, plus
//! an in-memory reference implementation used by the engine's own tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Self-Encryptor Engine          │
//! ├─────────────────────────────────────────┤
//! │             ChunkStore Trait            │
//! ├─────────────────────────────────────────┤
//! │             MemoryChunkStore            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! `put`/`get`/`delete` are blocking calls, mirroring the reference
//! engine's callback-based storage collaborator rather than an async trait:
//! an embedder that wants a non-blocking chunk store wraps one of these in
//! `tokio::task::spawn_blocking` at its own boundary.
//!
//! ## Example
//!
//! ```
//! use selfencrypt_store::{ChunkStore, MemoryChunkStore};
//! use selfencrypt_crypto::hash;
//!
//! let store = MemoryChunkStore::new();
//! let data = b"chunk ciphertext";
//! let key = hash(data);
//! store.put(key, data.to_vec()).unwrap();
//! assert_eq!(store.get(&key).unwrap(), data);
//! ```

pub mod error;
pub mod memory;

pub use error::{Result, StoreError};
pub use memory::MemoryChunkStore;

use selfencrypt_crypto::Sha512Hash;

/// The storage contract the self-encryption engine stores and retrieves
/// encrypted chunks through, keyed by each chunk's post-hash.
///
/// Implementations must be convergent: calling `put` twice with the same
/// key and the same bytes must be idempotent (not an error, not a second
/// copy), since two data maps that share a chunk will both `put` it.
pub trait ChunkStore: Send + Sync {
    /// Store `data` under `key`, the chunk's post-hash. Idempotent: storing
    /// the same key twice with the same bytes succeeds without duplicating
    /// storage.
    fn put(&self, key: Sha512Hash, data: Vec<u8>) -> Result<()>;

    /// Retrieve the bytes stored under `key`.
    ///
    /// # Errors
    /// Returns [`StoreError::Missing`] if no chunk is stored under `key`.
    fn get(&self, key: &Sha512Hash) -> Result<Vec<u8>>;

    /// Release a reference to the chunk stored under `key`. Implementations
    /// that reference-count shared chunks only free storage once every
    /// referencing data map has released it; a `delete` of a key that is
    /// not currently stored is not an error.
    fn delete(&self, key: &Sha512Hash) -> Result<()>;

    /// Whether a chunk is currently stored under `key`.
    fn contains(&self, key: &Sha512Hash) -> bool {
        self.get(key).is_ok()
    }
}
