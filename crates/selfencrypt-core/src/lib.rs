//! # Self-Encryption Core
//!
//! The random-access read/write/flush engine that sits on top of
//! `selfencrypt-crypto` and `selfencrypt-store`.
//!
//! This crate provides:
//! - **Data Map**: the inline-or-chunked content index for one file
//! - **Sequencer**: out-of-order write staging
//! - **Read Cache**: a sliding window over recently decrypted plaintext
//! - **Chunk Pipeline**: per-chunk key/IV/pad derivation and the
//!   encrypt/decrypt transform chain
//! - **Self-Encryptor Engine**: the public read/write/truncate/flush API
//! - **Data-Map Encryptor**: encrypting a data map for storage under a
//!   parent/this identity pair
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          SelfEncryptor (engine)          │
//! ├───────────────┬───────────────┬─────────┤
//! │   Sequencer   │  Read Cache   │  Data   │
//! │ (pending write│ (recent reads)│   Map   │
//! │    overlay)   │               │         │
//! ├───────────────┴───────────────┴─────────┤
//! │            Chunk Pipeline                │
//! │   (neighbor key/IV/pad derivation +      │
//! │    AES-256-CFB + XOR pad transform)      │
//! ├───────────────────────────────────────────┤
//! │             Chunk Store                  │
//! └─────────────────────────────────────────┘
//! ```

pub mod data_map;
pub mod engine;
pub mod error;
pub mod map_encryptor;
pub mod pipeline;
pub mod read_cache;
pub mod sequencer;
pub mod sizing;

pub use data_map::{ChunkDetails, DataMap, PreHashState, StorageState};
pub use engine::{EngineConfig, PlaintextHook, SelfEncryptor};
pub use error::{EngineError, Result};
pub use map_encryptor::{decrypt_data_map, encrypt_data_map, DATA_MAP_ENCRYPTION_VERSION_0};
pub use pipeline::{decrypt_chunk, derive_chunk_keys, encrypt_chunk, neighbor_indices, ChunkKeys};
pub use read_cache::ReadCache;
pub use sequencer::Sequencer;
pub use sizing::{chunk_sizes, is_inline, MAX_CHUNK, MIN_CHUNK, MIN_CHUNKS};
