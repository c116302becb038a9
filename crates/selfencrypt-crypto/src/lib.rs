//! # Self-Encryption Crypto Primitives
//!
//! The cryptographic building blocks used by the self-encryption engine:
//!
//! - **Hashing**: SHA-512, used for every pre-hash, post-hash, and data-map
//!   encryption key/pad derivation in the format.
//! - **Byte Buffer**: an owned, bounds-checked byte array used by the
//!   engine's internal queues.
//! - **XOR Pad Filter**: the cyclic XOR obfuscation layer applied on top of
//!   chunk ciphertext.
//! - **Symmetric primitives**: AES-256-CFB (the chunk cipher) and a gzip
//!   facade (used when a chunk's compressed form is smaller than its raw
//!   form).
//!
//! This crate has no notion of chunking policy, data maps, or the engine's
//! read/write state machine — those live in `selfencrypt-core`, which
//! depends on this crate for primitives only.

pub mod byte_buffer;
pub mod error;
pub mod hashing;
pub mod symmetric;
pub mod xor_pad;

pub use byte_buffer::ByteBuffer;
pub use error::{CryptoError, Result};
pub use hashing::{hash, hash_concat, HashOutput, Hasher, Sha512Hash, Sha512Hasher, HASH_BYTE_SIZE};
pub use symmetric::{
    aes256_cfb_decrypt, aes256_cfb_decrypt_in_place, aes256_cfb_encrypt,
    aes256_cfb_encrypt_in_place, gzip_compress, gzip_decompress, IV_SIZE, KEY_SIZE,
};
pub use xor_pad::{xor_with_pad, xor_with_pad_in_place, xor_with_pad_into, XorPadFilter, PAD_SIZE};
