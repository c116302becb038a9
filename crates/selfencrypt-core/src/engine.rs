//! Self-Encryptor Engine: the random-access read/write/truncate/flush state
//! machine built on top of the data map, sequencer, read cache, and chunk
//! pipeline.

use crate::data_map::{ChunkDetails, DataMap, PreHashState, StorageState};
use crate::error::{EngineError, Result};
use crate::pipeline::{decrypt_chunk, derive_chunk_keys, encrypt_chunk, neighbor_indices};
use crate::read_cache::ReadCache;
use crate::sequencer::Sequencer;
use crate::sizing::{self, MIN_CHUNKS};
use rayon::prelude::*;
use selfencrypt_crypto::{hash, Sha512Hash};
use selfencrypt_store::ChunkStore;
use std::sync::Arc;

/// A caller-supplied fallback consulted before the chunk store on chunk
/// reads, e.g. to serve plaintext the caller already holds elsewhere
/// without a round-trip through storage. Optional; most callers pass
/// `None`.
pub type PlaintextHook = Arc<dyn Fn(&Sha512Hash) -> Option<Vec<u8>> + Send + Sync>;

/// Configuration for a [`SelfEncryptor`], following the small
/// `Default`-implementing config struct pattern rather than a global.
#[derive(Clone)]
pub struct EngineConfig {
    /// Worker count for the flush-time parallel chunk encrypt/decrypt pass.
    /// `Some(1)` (or a pool of size 1) forces a sequential pass, useful for
    /// deterministic tests. `None` uses rayon's default global pool sizing.
    pub num_workers: Option<usize>,
    /// Read cache capacity in bytes. Defaults to `8 * MAX_CHUNK`.
    pub read_cache_capacity: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_workers: None,
            read_cache_capacity: crate::read_cache::DEFAULT_CAPACITY,
        }
    }
}

/// The random-access read/write/truncate/flush engine for one file's worth
/// of self-encrypted content.
///
/// All buffered, unflushed writes live in `pending`, a [`Sequencer`] used as
/// a single coalescing overlay over the whole file rather than as a
/// narrower out-of-order staging area alongside separate first/second-chunk
/// buffers — see DESIGN.md for why that simplification preserves this
/// type's externally observable read/write/flush contract.
pub struct SelfEncryptor<S: ChunkStore> {
    store: S,
    data_map: DataMap,
    original_data_map: DataMap,
    file_size: u64,
    pending: Sequencer,
    read_cache: ReadCache,
    flushed: bool,
    plaintext_hook: Option<PlaintextHook>,
    config: EngineConfig,
}

impl<S: ChunkStore> SelfEncryptor<S> {
    /// Open an engine over `data_map` using `store` for chunk I/O. Never
    /// fails; the data map is not touched until the first `write` or
    /// `flush`.
    pub fn open(data_map: DataMap, store: S, config: EngineConfig) -> Self {
        let file_size = data_map.file_size();
        let read_cache = ReadCache::new(config.read_cache_capacity);
        Self {
            original_data_map: data_map.clone(),
            data_map,
            file_size,
            pending: Sequencer::new(),
            read_cache,
            flushed: true,
            plaintext_hook: None,
            store,
            config,
        }
    }

    /// Open an engine with a plaintext fallback hook consulted before the
    /// chunk store on every chunk read.
    pub fn open_with_hook(
        data_map: DataMap,
        store: S,
        config: EngineConfig,
        hook: PlaintextHook,
    ) -> Self {
        let mut engine = Self::open(data_map, store, config);
        engine.plaintext_hook = Some(hook);
        engine
    }

    /// Current logical file size.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// The data map as it stood when this engine was opened.
    pub fn original_data_map(&self) -> &DataMap {
        &self.original_data_map
    }

    /// The current data map. Only reflects buffered writes after a
    /// successful `flush`.
    pub fn data_map(&self) -> &DataMap {
        &self.data_map
    }

    /// Write `bytes` starting at `position`, extending the logical file if
    /// necessary. Writes may arrive in any order; out-of-order or
    /// non-adjacent writes are staged in the sequencer until `flush`.
    pub fn write(&mut self, bytes: &[u8], position: u64) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if bytes.len() > u32::MAX as usize {
            return Err(EngineError::InvalidPosition(
                "write length exceeds u32::MAX".to_string(),
            ));
        }
        let new_end = position
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| EngineError::InvalidPosition("position overflow".to_string()))?;

        self.pending.add(position, bytes)?;
        self.file_size = self.file_size.max(new_end);
        self.flushed = false;
        self.read_cache.clear();
        Ok(())
    }

    /// Grow (zero-fill) or shrink the logical file to `new_size`.
    pub fn truncate(&mut self, new_size: u64) -> Result<()> {
        if new_size < self.file_size {
            self.pending.truncate(new_size);
        }
        self.file_size = new_size;
        self.flushed = false;
        self.read_cache.clear();
        Ok(())
    }

    /// Fill `out` with `out.len()` bytes starting at `position`.
    pub fn read(&mut self, out: &mut [u8], position: u64) -> Result<()> {
        let length = out.len() as u64;
        if position.checked_add(length).map_or(true, |end| end > self.file_size) {
            return Err(EngineError::InvalidPosition(format!(
                "read of {length} bytes at {position} exceeds file size {}",
                self.file_size
            )));
        }
        out.iter_mut().for_each(|b| *b = 0);

        self.read_from_data_map(out, position)?;
        self.pending.fill_range(position, position + length, out, false);
        Ok(())
    }

    fn read_from_data_map(&mut self, out: &mut [u8], position: u64) -> Result<()> {
        let dm_size = self.data_map.file_size();
        if dm_size == 0 {
            return Ok(());
        }
        let end = position + out.len() as u64;
        let read_end = end.min(dm_size);
        if position >= read_end {
            return Ok(());
        }

        if self.data_map.is_inline() {
            let lo = position as usize;
            let hi = read_end as usize;
            out[0..hi - lo].copy_from_slice(&self.data_map.inline_content[lo..hi]);
            return Ok(());
        }

        let n = self.data_map.chunks.len();
        let mut chunk_start = 0u64;
        for i in 0..n {
            let pre_size = self.data_map.chunks[i].pre_size as u64;
            let chunk_end = chunk_start + pre_size;
            if chunk_end > position && chunk_start < read_end {
                let plaintext = self.plaintext_for_chunk(i)?;
                let overlap_start = chunk_start.max(position);
                let overlap_end = chunk_end.min(read_end);
                let src_off = (overlap_start - chunk_start) as usize;
                let src_len = (overlap_end - overlap_start) as usize;
                let dst_off = (overlap_start - position) as usize;
                out[dst_off..dst_off + src_len]
                    .copy_from_slice(&plaintext[src_off..src_off + src_len]);
            }
            chunk_start = chunk_end;
            if chunk_start >= read_end {
                break;
            }
        }
        Ok(())
    }

    fn plaintext_for_chunk(&mut self, i: usize) -> Result<Vec<u8>> {
        let chunk_start = self.data_map.chunks[..i]
            .iter()
            .map(|c| c.pre_size as u64)
            .sum::<u64>();

        let pre_size = self.data_map.chunks[i].pre_size as usize;
        let mut cached = vec![0u8; pre_size];
        if self.read_cache.get(&mut cached, pre_size, chunk_start) {
            return Ok(cached);
        }

        let n = self.data_map.chunks.len();
        let (n1, n2) = neighbor_indices(i, n);
        let keys = derive_chunk_keys(
            &self.data_map.chunks[n1].pre_hash,
            &self.data_map.chunks[i].pre_hash,
            &self.data_map.chunks[n2].pre_hash,
        );

        let post_hash = self.data_map.chunks[i].post_hash;
        let pre_hash = self.data_map.chunks[i].pre_hash;

        let plaintext = if let Some(hook) = &self.plaintext_hook {
            if let Some(bytes) = hook(&post_hash) {
                bytes
            } else {
                decrypt_chunk(&post_hash, &keys, &pre_hash, &self.store)?
            }
        } else {
            decrypt_chunk(&post_hash, &keys, &pre_hash, &self.store)?
        };

        self.read_cache.put(&plaintext, chunk_start);
        Ok(plaintext)
    }

    /// Materialize the full current logical plaintext into memory: the
    /// persisted data map's content overlaid with every pending write.
    /// Used by `flush`, which must see the whole file at once to recompute
    /// chunk boundaries and neighbor pre-hashes.
    fn materialize(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.file_size as usize];
        self.read_from_data_map(&mut buf, 0)?;
        let mut dummy = Sequencer::new();
        std::mem::swap(&mut dummy, &mut self.pending);
        dummy.fill_range(0, self.file_size, &mut buf, false);
        self.pending = dummy;
        Ok(buf)
    }

    /// Finalize all pending writes: recompute the data map so it exactly
    /// reflects the current logical contents, storing any chunk whose
    /// plaintext or neighbor pre-hashes changed and best-effort deleting
    /// any chunk no longer referenced.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        let span = tracing::info_span!("flush", file_size = self.file_size);
        let _enter = span.enter();

        if sizing::is_inline(self.file_size) {
            let content = self.materialize()?;
            self.delete_all_chunks(&self.data_map.chunks.clone());
            self.data_map = DataMap::from_inline(content);
        } else {
            let content = self.materialize()?;
            let sizes = sizing::chunk_sizes(self.file_size);
            let new_chunks = self.rebuild_chunks(&content, &sizes)?;
            self.data_map = DataMap::from_chunks(new_chunks);
        }

        self.original_data_map = self.data_map.clone();
        self.pending = Sequencer::new();
        self.flushed = true;
        // `materialize` above may have repopulated the cache with plaintext
        // keyed to the data map as it stood before this rebuild; drop it so
        // reads after this point only ever see chunks decrypted against the
        // now-current data map.
        self.read_cache.clear();
        Ok(())
    }

    fn rebuild_chunks(&mut self, content: &[u8], sizes: &[u32]) -> Result<Vec<ChunkDetails>> {
        let n = sizes.len();
        let mut offsets = Vec::with_capacity(n);
        let mut offset = 0usize;
        for &size in sizes {
            offsets.push(offset);
            offset += size as usize;
        }

        let pre_hashes: Vec<Sha512Hash> = sizes
            .iter()
            .zip(offsets.iter())
            .map(|(&size, &off)| hash(&content[off..off + size as usize]))
            .collect();

        let old_chunks = self.data_map.chunks.clone();
        let reuse_possible = old_chunks.len() == n;

        let unchanged: Vec<bool> = (0..n)
            .map(|i| {
                if !reuse_possible {
                    return false;
                }
                let (n1, n2) = neighbor_indices(i, n);
                pre_hashes[i] == old_chunks[i].pre_hash
                    && pre_hashes[n1] == old_chunks[n1].pre_hash
                    && pre_hashes[n2] == old_chunks[n2].pre_hash
            })
            .collect();

        tracing::debug!(
            chunks_total = n,
            chunks_reused = unchanged.iter().filter(|&&u| u).count(),
            "chunk pipeline encrypt batch"
        );

        let work = |i: usize| -> Result<ChunkDetails> {
            if unchanged[i] {
                return Ok(old_chunks[i].clone());
            }
            let (n1, n2) = neighbor_indices(i, n);
            let keys = derive_chunk_keys(&pre_hashes[n1], &pre_hashes[i], &pre_hashes[n2]);
            let off = offsets[i];
            let size = sizes[i] as usize;
            let (post_hash, stored_size) =
                encrypt_chunk(&content[off..off + size], &keys, &self.store)?;
            Ok(ChunkDetails {
                pre_hash: pre_hashes[i],
                post_hash,
                size: stored_size,
                pre_size: sizes[i],
                pre_hash_state: PreHashState::Ok,
                storage_state: StorageState::Stored,
            })
        };

        let new_chunks: Vec<ChunkDetails> = if self.config.num_workers == Some(1) {
            (0..n).map(work).collect::<Result<Vec<_>>>()?
        } else {
            (0..n)
                .into_par_iter()
                .map(work)
                .collect::<Result<Vec<_>>>()?
        };

        for i in 0..old_chunks.len() {
            let still_referenced = reuse_possible && unchanged[i];
            let same_physical_chunk = reuse_possible && old_chunks[i].post_hash == new_chunks[i].post_hash;
            if still_referenced || same_physical_chunk {
                continue;
            }
            if old_chunks[i].storage_state == StorageState::Stored {
                if let Err(e) = self.store.delete(&old_chunks[i].post_hash) {
                    tracing::warn!(error = %e, chunk = %old_chunks[i].post_hash, "best-effort chunk delete failed");
                }
            }
        }

        Ok(new_chunks)
    }

    fn delete_all_chunks(&self, chunks: &[ChunkDetails]) {
        for c in chunks {
            if c.storage_state == StorageState::Stored {
                if let Err(e) = self.store.delete(&c.post_hash) {
                    tracing::warn!(error = %e, chunk = %c.post_hash, "best-effort chunk delete failed");
                }
            }
        }
    }

    /// Flush and forbid further mutation. Consumes the engine; call
    /// [`Self::data_map`] before dropping if the final map is needed, or
    /// capture this method's return value.
    pub fn close(mut self) -> Result<DataMap> {
        self.flush()?;
        Ok(self.data_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::{MAX_CHUNK, MIN_CHUNK};
    use selfencrypt_store::MemoryChunkStore;

    fn engine() -> SelfEncryptor<MemoryChunkStore> {
        SelfEncryptor::open(DataMap::new(), MemoryChunkStore::new(), EngineConfig::default())
    }

    #[test]
    fn test_tiny_file_roundtrip() {
        let mut e = engine();
        e.write(b"abc", 0).unwrap();
        e.flush().unwrap();
        assert!(e.data_map().is_inline());
        assert_eq!(e.data_map().inline_content, b"abc");

        let mut out = vec![0u8; 3];
        e.read(&mut out, 0).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_three_chunk_minimum() {
        let mut e = engine();
        let data = vec![0x5Au8; 3 * MIN_CHUNK as usize];
        e.write(&data, 0).unwrap();
        e.flush().unwrap();

        assert_eq!(e.data_map().chunk_count(), 3);
        let post_hashes: Vec<_> = e.data_map().chunks.iter().map(|c| c.post_hash).collect();
        assert_eq!(post_hashes[0], post_hashes[1]);
        assert_eq!(post_hashes[1], post_hashes[2]);

        let mut out = vec![0u8; data.len()];
        e.read(&mut out, 0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_cross_chunk_read() {
        let mut e = engine();
        let size = 3 * MAX_CHUNK as usize;
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        e.write(&data, 0).unwrap();
        e.flush().unwrap();

        let start = MAX_CHUNK as usize / 2;
        let len = 2 * MAX_CHUNK as usize;
        let mut out = vec![0u8; len];
        e.read(&mut out, start as u64).unwrap();
        assert_eq!(out, data[start..start + len]);
    }

    #[test]
    fn test_out_of_order_writes() {
        let mut e = engine();
        let size = 3 * MIN_CHUNK as usize + 50;
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();

        e.write(&data[100..200], 100).unwrap();
        e.write(&data[0..50], 0).unwrap();
        e.write(&data[50..100], 50).unwrap();
        e.write(&data[200..], 200).unwrap();
        e.flush().unwrap();

        let mut out = vec![0u8; size];
        e.read(&mut out, 0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_truncate_grow_then_partial_overwrite() {
        let mut e = engine();
        let total = 10 * MAX_CHUNK as u64;
        e.truncate(total).unwrap();
        e.write(b"x", 5 * MAX_CHUNK as u64).unwrap();
        e.flush().unwrap();

        let mut one = vec![0u8; 1];
        e.read(&mut one, 5 * MAX_CHUNK as u64).unwrap();
        assert_eq!(one, b"x");

        e.read(&mut one, 0).unwrap();
        assert_eq!(one, vec![0u8]);

        assert_eq!(e.data_map().file_size(), total);
    }

    #[test]
    fn test_zero_plaintext_dedup() {
        let mut e = engine();
        e.truncate(5 * MAX_CHUNK as u64).unwrap();
        e.flush().unwrap();

        let store = &e.store;
        assert!(store.len() <= 3, "at most 3 distinct chunk keys for an all-zero file, got {}", store.len());
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut e = engine();
        e.write(&vec![1u8; 3 * MAX_CHUNK as usize], 0).unwrap();
        e.flush().unwrap();
        let size_after_first = e.store.total_size();

        e.flush().unwrap();
        assert_eq!(e.store.total_size(), size_after_first);
    }

    #[test]
    fn test_neighbor_ripple_touches_only_three_chunks() {
        let mut e = engine();
        let size = 6 * MAX_CHUNK as usize;
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        e.write(&data, 0).unwrap();
        e.flush().unwrap();

        let before: Vec<_> = e.data_map().chunks.iter().map(|c| c.post_hash).collect();

        // Modify a byte inside chunk 2.
        let target_chunk = 2usize;
        let offset = target_chunk * MAX_CHUNK as usize + 10;
        e.write(&[0xFFu8], offset as u64).unwrap();
        e.flush().unwrap();

        let after: Vec<_> = e.data_map().chunks.iter().map(|c| c.post_hash).collect();
        let n = before.len();
        for i in 0..n {
            let rippled = i == target_chunk || i == (target_chunk + 1) % n || i == (target_chunk + 2) % n;
            if rippled {
                continue;
            }
            assert_eq!(before[i], after[i], "chunk {i} should not have changed");
        }
    }

    #[test]
    fn test_small_file_inline_boundary() {
        let boundary = MIN_CHUNKS as u64 * MIN_CHUNK as u64;

        let mut below = engine();
        below.write(&vec![1u8; (boundary - 1) as usize], 0).unwrap();
        below.flush().unwrap();
        assert_eq!(below.data_map().chunk_count(), 0);
        assert_eq!(below.data_map().inline_content.len() as u64, boundary - 1);

        let mut at = engine();
        at.write(&vec![1u8; boundary as usize], 0).unwrap();
        at.flush().unwrap();
        assert_eq!(at.data_map().chunk_count(), 3);
        assert!(at.data_map().inline_content.is_empty());
    }

    #[test]
    fn test_read_out_of_range_fails() {
        let mut e = engine();
        e.write(b"abc", 0).unwrap();
        e.flush().unwrap();

        let mut out = vec![0u8; 10];
        let result = e.read(&mut out, 0);
        assert!(matches!(result, Err(EngineError::InvalidPosition(_))));
    }

    #[test]
    fn test_convergence_across_independent_engines() {
        let size = 4 * MAX_CHUNK as usize;
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();

        let mut e1 = SelfEncryptor::open(DataMap::new(), MemoryChunkStore::new(), EngineConfig::default());
        e1.write(&data, 0).unwrap();
        e1.flush().unwrap();

        let mut e2 = SelfEncryptor::open(DataMap::new(), MemoryChunkStore::new(), EngineConfig::default());
        e2.write(&data, 0).unwrap();
        e2.flush().unwrap();

        let hashes1: Vec<_> = e1.data_map().chunks.iter().map(|c| c.post_hash).collect();
        let hashes2: Vec<_> = e2.data_map().chunks.iter().map(|c| c.post_hash).collect();
        assert_eq!(hashes1, hashes2);
    }
}
