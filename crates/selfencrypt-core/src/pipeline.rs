//! Chunk Pipeline: derives each chunk's key/IV/pad from its neighbors and
//! drives the encrypt/decrypt transform chain (AES-256-CFB, then the XOR
//! pad, then storage keyed by SHA-512 of the stored bytes).

use crate::error::{EngineError, Result};
use selfencrypt_crypto::{
    aes256_cfb_decrypt, aes256_cfb_encrypt, hash, xor_with_pad, Sha512Hash, IV_SIZE, KEY_SIZE,
};
use selfencrypt_store::ChunkStore;
use zeroize::Zeroize;

/// The key, IV, and XOR pad derived for one chunk from its two neighbors'
/// pre-hashes. Zeroized on drop since, unlike the pre-hashes it's derived
/// from, this is live symmetric key material.
pub struct ChunkKeys {
    pub key: [u8; KEY_SIZE],
    pub iv: [u8; IV_SIZE],
    pub pad: [u8; selfencrypt_crypto::PAD_SIZE],
}

impl Drop for ChunkKeys {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
        self.pad.zeroize();
    }
}

/// Compute the neighbor indices for chunk `i` out of `n` total chunks:
/// `n1 = (i + n - 1) % n`, `n2 = (i + n - 2) % n`.
pub fn neighbor_indices(i: usize, n: usize) -> (usize, usize) {
    debug_assert!(n > 0 && i < n);
    let n1 = (i + n - 1) % n;
    let n2 = (i + n - 2) % n;
    (n1, n2)
}

/// Derive the key/IV/pad for chunk `i` from the pre-hashes of its two
/// neighbors and itself, per §4.2.
///
/// `pre_hash_n1` is the pre-hash of neighbor `n1 = (i + n - 1) % n`,
/// `pre_hash_i` is this chunk's own pre-hash, and `pre_hash_n2` is the
/// pre-hash of neighbor `n2 = (i + n - 2) % n`.
///
/// `key` and `iv` come from the first 48 bytes of `pre_hash_n1`. The pad is
/// `pre_hash_n1` (64 bytes, full) || `pre_hash_i` (64 bytes, full) ||
/// `pre_hash_n2[48..64]` (last 16 bytes) — 144 bytes total. This layout is
/// load-bearing: it is what makes three chunks with identical pre-hashes
/// converge to one post-hash.
pub fn derive_chunk_keys(
    pre_hash_n1: &Sha512Hash,
    pre_hash_i: &Sha512Hash,
    pre_hash_n2: &Sha512Hash,
) -> ChunkKeys {
    let n1 = pre_hash_n1.as_bytes();
    let i = pre_hash_i.as_bytes();
    let n2 = pre_hash_n2.as_bytes();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&n1[0..32]);

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&n1[32..48]);

    let mut pad = [0u8; selfencrypt_crypto::PAD_SIZE];
    pad[0..64].copy_from_slice(n1);
    pad[64..128].copy_from_slice(i);
    pad[128..144].copy_from_slice(&n2[48..64]);

    ChunkKeys { key, iv, pad }
}

/// Encrypt `plaintext` using `keys`, compute its post-hash, and store it in
/// `store`. Returns `(post_hash, stored_bytes_len)`.
pub fn encrypt_chunk<S: ChunkStore>(
    plaintext: &[u8],
    keys: &ChunkKeys,
    store: &S,
) -> Result<(Sha512Hash, u32)> {
    let ciphertext = aes256_cfb_encrypt(&keys.key, &keys.iv, plaintext)?;
    let stored_bytes = xor_with_pad(&ciphertext, &keys.pad);
    let post_hash = hash(&stored_bytes);
    let len = stored_bytes.len() as u32;
    store.put(post_hash, stored_bytes)?;
    Ok((post_hash, len))
}

/// Fetch and decrypt the chunk stored under `post_hash`, verifying that its
/// plaintext hashes to `expected_pre_hash`.
pub fn decrypt_chunk<S: ChunkStore>(
    post_hash: &Sha512Hash,
    keys: &ChunkKeys,
    expected_pre_hash: &Sha512Hash,
    store: &S,
) -> Result<Vec<u8>> {
    let stored_bytes = store.get(post_hash)?;
    let ciphertext = xor_with_pad(&stored_bytes, &keys.pad);
    let plaintext = aes256_cfb_decrypt(&keys.key, &keys.iv, &ciphertext)?;

    let actual_pre_hash = hash(&plaintext);
    if &actual_pre_hash != expected_pre_hash {
        return Err(EngineError::Corrupt(format!(
            "chunk {post_hash} decrypted plaintext does not match recorded pre-hash"
        )));
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfencrypt_crypto::hash;
    use selfencrypt_store::MemoryChunkStore;

    #[test]
    fn test_neighbor_indices_wrap_around() {
        assert_eq!(neighbor_indices(0, 5), (4, 3));
        assert_eq!(neighbor_indices(1, 5), (0, 4));
        assert_eq!(neighbor_indices(4, 5), (3, 2));
    }

    #[test]
    fn test_pad_layout_is_144_bytes() {
        let h1 = hash(b"neighbor one");
        let h2 = hash(b"this chunk");
        let h3 = hash(b"neighbor two");
        let keys = derive_chunk_keys(&h1, &h2, &h3);
        assert_eq!(keys.pad.len(), selfencrypt_crypto::PAD_SIZE);
        assert_eq!(keys.key, h1.as_bytes()[0..32]);
        assert_eq!(keys.iv, h1.as_bytes()[32..48]);
        assert_eq!(&keys.pad[0..64], h1.as_bytes());
        assert_eq!(&keys.pad[64..128], h2.as_bytes());
        assert_eq!(&keys.pad[128..144], &h3.as_bytes()[48..64]);
    }

    #[test]
    fn test_encrypt_then_decrypt_roundtrip() {
        let store = MemoryChunkStore::new();
        let plaintext = b"this is a chunk's worth of plaintext".to_vec();
        let pre_hash = hash(&plaintext);

        let h1 = hash(b"neighbor one");
        let h3 = hash(b"neighbor two");
        let keys = derive_chunk_keys(&h1, &pre_hash, &h3);

        let (post_hash, len) = encrypt_chunk(&plaintext, &keys, &store).unwrap();
        assert_eq!(len as usize, plaintext.len());

        let decrypted = decrypt_chunk(&post_hash, &keys, &pre_hash, &store).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_detects_corruption() {
        let store = MemoryChunkStore::new();
        let plaintext = b"original plaintext".to_vec();
        let pre_hash = hash(&plaintext);
        let wrong_pre_hash = hash(b"something else entirely");

        let h1 = hash(b"neighbor one");
        let h3 = hash(b"neighbor two");
        let keys = derive_chunk_keys(&h1, &pre_hash, &h3);

        let (post_hash, _) = encrypt_chunk(&plaintext, &keys, &store).unwrap();
        let result = decrypt_chunk(&post_hash, &keys, &wrong_pre_hash, &store);
        assert!(matches!(result, Err(EngineError::Corrupt(_))));
    }

    #[test]
    fn test_homogeneous_neighbors_produce_same_post_hash() {
        // Three chunks of identical plaintext with identical pre-hashes:
        // each chunk's key/iv/pad derivation only depends on the pre-hash
        // values, so all three post-hashes coincide.
        let store = MemoryChunkStore::new();
        let plaintext = vec![0x5Au8; 1024];
        let pre_hash = hash(&plaintext);

        let keys = derive_chunk_keys(&pre_hash, &pre_hash, &pre_hash);
        let (post_hash_0, _) = encrypt_chunk(&plaintext, &keys, &store).unwrap();
        let (post_hash_1, _) = encrypt_chunk(&plaintext, &keys, &store).unwrap();
        assert_eq!(post_hash_0, post_hash_1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(&post_hash_0), 2);
    }
}
