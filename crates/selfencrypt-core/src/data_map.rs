//! Data Map: the structure describing how to reconstruct a file from either
//! inline content or an ordered list of encrypted chunks.

use crate::error::{EngineError, Result};
use selfencrypt_crypto::{Sha512Hash, HASH_BYTE_SIZE};
use serde::{Deserialize, Serialize};

/// Whether a chunk descriptor's `pre_hash` reflects the chunk's current
/// buffered/plaintext content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreHashState {
    /// No pre-hash has ever been computed for this descriptor.
    Empty = 0,
    /// The plaintext changed since the pre-hash was last computed.
    Outdated = 1,
    /// The pre-hash matches the chunk's current plaintext.
    Ok = 2,
}

/// Whether a chunk descriptor's `post_hash` is currently present in the
/// chunk store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageState {
    /// The chunk is present in the chunk store under `post_hash`.
    Stored = 0,
    /// The chunk is queued to be stored on the next flush.
    Pending = 1,
    /// The chunk has not been stored (and may not yet have valid bytes).
    Unstored = 2,
}

/// One chunk's bookkeeping: its plaintext and ciphertext hashes, sizes, and
/// freshness/storage flags.
#[derive(Clone, Debug)]
pub struct ChunkDetails {
    /// Hash of the plaintext chunk.
    pub pre_hash: Sha512Hash,
    /// Hash of the encrypted chunk; also its chunk-store key.
    pub post_hash: Sha512Hash,
    /// Size of the encrypted chunk in bytes.
    pub size: u32,
    /// Size of the plaintext chunk in bytes.
    pub pre_size: u32,
    /// Freshness of `pre_hash` relative to the chunk's current plaintext.
    pub pre_hash_state: PreHashState,
    /// Whether `post_hash` is currently present in the chunk store.
    pub storage_state: StorageState,
}

impl ChunkDetails {
    /// A descriptor with no hashes computed yet, sized for `pre_size` bytes
    /// of plaintext.
    pub fn empty(pre_size: u32) -> Self {
        Self {
            pre_hash: Sha512Hash::default(),
            post_hash: Sha512Hash::default(),
            size: 0,
            pre_size,
            pre_hash_state: PreHashState::Empty,
            storage_state: StorageState::Unstored,
        }
    }
}

/// The wire form of a chunk descriptor (§6): raw hash bytes via
/// `serde_bytes` so bincode doesn't emit them as a 64-element sequence.
#[derive(Serialize, Deserialize)]
struct WireChunkDetails {
    #[serde(with = "serde_bytes")]
    hash: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pre_hash: Vec<u8>,
    size: u32,
    pre_size: u32,
    pre_hash_state: PreHashState,
    storage_state: StorageState,
}

/// Reserved for future chunk-plaintext compression; this core only ever
/// writes and accepts [`COMPRESSION_NONE`].
pub const COMPRESSION_NONE: u8 = 0;

/// The wire form of a data map (§6).
#[derive(Serialize, Deserialize)]
struct WireDataMap {
    #[serde(with = "serde_bytes")]
    content: Vec<u8>,
    chunks: Vec<WireChunkDetails>,
    compression_algorithm: u8,
}

/// Describes how to reconstruct a file: either small-file inline content,
/// or an ordered list of chunk descriptors. Never both at once.
#[derive(Clone, Debug, Default)]
pub struct DataMap {
    /// Inline content for small files. Non-empty iff `chunks` is empty.
    pub inline_content: Vec<u8>,
    /// Ordered chunk descriptors. Non-empty iff `inline_content` is empty.
    pub chunks: Vec<ChunkDetails>,
}

impl DataMap {
    /// An empty data map (zero-length file).
    pub fn new() -> Self {
        Self::default()
    }

    /// A data map holding only inline content.
    pub fn from_inline(content: Vec<u8>) -> Self {
        Self {
            inline_content: content,
            chunks: Vec::new(),
        }
    }

    /// A data map holding only chunk descriptors.
    pub fn from_chunks(chunks: Vec<ChunkDetails>) -> Self {
        Self {
            inline_content: Vec::new(),
            chunks,
        }
    }

    /// Whether the data map describes a zero-length file.
    pub fn is_empty(&self) -> bool {
        self.inline_content.is_empty() && self.chunks.is_empty()
    }

    /// Whether this data map uses inline content rather than chunks.
    pub fn is_inline(&self) -> bool {
        !self.inline_content.is_empty()
    }

    /// The logical size of the file this data map describes.
    pub fn file_size(&self) -> u64 {
        if self.is_inline() {
            self.inline_content.len() as u64
        } else {
            self.chunks.iter().map(|c| c.pre_size as u64).sum()
        }
    }

    /// The number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Serialize to the data map's wire format (§6): bincode over a
    /// field layout matching the spec's abstract schema.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let wire = WireDataMap {
            content: self.inline_content.clone(),
            chunks: self
                .chunks
                .iter()
                .map(|c| WireChunkDetails {
                    hash: c.post_hash.as_bytes().to_vec(),
                    pre_hash: c.pre_hash.as_bytes().to_vec(),
                    size: c.size,
                    pre_size: c.pre_size,
                    pre_hash_state: c.pre_hash_state,
                    storage_state: c.storage_state,
                })
                .collect(),
            compression_algorithm: COMPRESSION_NONE,
        };
        bincode::serialize(&wire).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Parse a data map from its wire format. Fails with
    /// [`EngineError::Corrupt`] if the compression algorithm byte names
    /// anything other than [`COMPRESSION_NONE`] — this core does not
    /// implement chunk compression and must not silently skip it.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let wire: WireDataMap =
            bincode::deserialize(bytes).map_err(|e| EngineError::Serialization(e.to_string()))?;

        if wire.compression_algorithm != COMPRESSION_NONE {
            return Err(EngineError::Corrupt(format!(
                "unrecognized compression algorithm {}",
                wire.compression_algorithm
            )));
        }

        let mut chunks = Vec::with_capacity(wire.chunks.len());
        for c in wire.chunks {
            if c.hash.len() != HASH_BYTE_SIZE || c.pre_hash.len() != HASH_BYTE_SIZE {
                return Err(EngineError::Serialization(format!(
                    "chunk hash must be {HASH_BYTE_SIZE} bytes"
                )));
            }
            chunks.push(ChunkDetails {
                pre_hash: Sha512Hash::from_slice(&c.pre_hash)
                    .map_err(|e| EngineError::Serialization(e.to_string()))?,
                post_hash: Sha512Hash::from_slice(&c.hash)
                    .map_err(|e| EngineError::Serialization(e.to_string()))?,
                size: c.size,
                pre_size: c.pre_size,
                pre_hash_state: c.pre_hash_state,
                storage_state: c.storage_state,
            });
        }

        Ok(Self {
            inline_content: wire.content,
            chunks,
        })
    }
}
