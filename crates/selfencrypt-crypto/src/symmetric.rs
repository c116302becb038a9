//! AES-256-CFB encryption and the gzip compression facade.
//!
//! Chunk ciphertexts are produced with AES-256-CFB keyed and IV'd from a
//! neighboring chunk's pre-hash (see the chunk pipeline), never with a
//! randomly generated key — convergent encryption requires that encrypting
//! the same plaintext chunk with the same neighbors always yields the same
//! ciphertext. CFB is a stream-cipher mode with no authentication tag of its
//! own; integrity instead comes from comparing the decrypted plaintext's
//! SHA-512 against the stored pre-hash (see the chunk pipeline's decrypt
//! path).

use crate::{CryptoError, Result};
use aes::Aes256;
use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use flate2::Compression;
use flate2::read::{GzDecoder, GzEncoder};
use std::io::Read;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AES block size / CFB IV size in bytes.
pub const IV_SIZE: usize = 16;

type Encryptor = cfb_mode::Encryptor<Aes256>;
type Decryptor = cfb_mode::Decryptor<Aes256>;

/// Encrypt `plaintext` with AES-256-CFB under `key`/`iv`.
///
/// `key` must be exactly [`KEY_SIZE`] bytes and `iv` exactly [`IV_SIZE`]
/// bytes; both are derived from a chunk's neighbors, never generated here.
pub fn aes256_cfb_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = make_encryptor(key, iv)?;
    let mut buf = plaintext.to_vec();
    cipher.encrypt(&mut buf);
    Ok(buf)
}

/// Decrypt `ciphertext` with AES-256-CFB under `key`/`iv`.
pub fn aes256_cfb_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = make_decryptor(key, iv)?;
    let mut buf = ciphertext.to_vec();
    cipher.decrypt(&mut buf);
    Ok(buf)
}

/// Encrypt `plaintext` in place with AES-256-CFB under `key`/`iv`.
pub fn aes256_cfb_encrypt_in_place(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let cipher = make_encryptor(key, iv)?;
    cipher.encrypt(buf);
    Ok(())
}

/// Decrypt `ciphertext` in place with AES-256-CFB under `key`/`iv`.
pub fn aes256_cfb_decrypt_in_place(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let cipher = make_decryptor(key, iv)?;
    cipher.decrypt(buf);
    Ok(())
}

fn make_encryptor(key: &[u8], iv: &[u8]) -> Result<Encryptor> {
    check_lengths(key, iv)?;
    Encryptor::new_from_slices(key, iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn make_decryptor(key: &[u8], iv: &[u8]) -> Result<Decryptor> {
    check_lengths(key, iv)?;
    Decryptor::new_from_slices(key, iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn check_lengths(key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "key must be {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "iv must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    Ok(())
}

/// gzip-compress `data` at the default compression level.
///
/// Used when a chunk's plaintext compresses well enough that storing the
/// compressed form (and recording the pre-compression size separately) saves
/// space; the decision of whether to compress a given chunk lives with the
/// chunk pipeline, not here.
pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(data, Compression::default());
    let mut out = Vec::new();
    encoder.read_to_end(&mut out)?;
    Ok(out)
}

/// gzip-decompress `data`.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
