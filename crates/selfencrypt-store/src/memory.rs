//! In-memory, reference-counted chunk store.

use crate::{ChunkStore, Result, StoreError};
use dashmap::DashMap;
use selfencrypt_crypto::Sha512Hash;
use std::sync::Arc;

/// An in-memory chunk store, reference-counting each stored chunk so that
/// two data maps sharing a convergent chunk don't free it out from under
/// each other.
#[derive(Clone, Default)]
pub struct MemoryChunkStore {
    chunks: Arc<DashMap<Sha512Hash, (Vec<u8>, u32)>>,
}

impl MemoryChunkStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(DashMap::new()),
        }
    }

    /// Number of distinct chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes across all stored chunks.
    pub fn total_size(&self) -> u64 {
        self.chunks.iter().map(|e| e.value().0.len() as u64).sum()
    }

    /// Current reference count for `key`, or 0 if not stored.
    pub fn ref_count(&self, key: &Sha512Hash) -> u32 {
        self.chunks.get(key).map(|e| e.value().1).unwrap_or(0)
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, key: Sha512Hash, data: Vec<u8>) -> Result<()> {
        self.chunks
            .entry(key)
            .and_modify(|(_, refs)| *refs += 1)
            .or_insert((data, 1));
        Ok(())
    }

    fn get(&self, key: &Sha512Hash) -> Result<Vec<u8>> {
        self.chunks
            .get(key)
            .map(|entry| entry.value().0.clone())
            .ok_or(StoreError::Missing(*key))
    }

    fn delete(&self, key: &Sha512Hash) -> Result<()> {
        let mut remove = false;
        if let Some(mut entry) = self.chunks.get_mut(key) {
            if entry.value().1 <= 1 {
                remove = true;
            } else {
                entry.value_mut().1 -= 1;
            }
        }
        if remove {
            self.chunks.remove(key);
        }
        Ok(())
    }
}
