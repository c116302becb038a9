//! Data-Map Encryptor: encrypts a serialized data map against a
//! `(parent_id, this_id)` identity pair, using the same AES-256-CFB +
//! cyclic-XOR transform chain as the chunk pipeline, but keyed from the
//! identities instead of neighbor pre-hashes.

use crate::data_map::DataMap;
use crate::error::{EngineError, Result};
use selfencrypt_crypto::{aes256_cfb_decrypt, aes256_cfb_encrypt, hash_concat, xor_with_pad};

/// Version byte prepended to every encrypted data map. Only one version is
/// currently defined; an unrecognized version fails decryption with
/// [`EngineError::Corrupt`].
pub const DATA_MAP_ENCRYPTION_VERSION_0: u32 = 1;

/// Encrypt `data_map` against the identity pair `(parent_id, this_id)`.
///
/// `parent_id` and `this_id` are each 64 bytes (the format does not
/// constrain their provenance; callers typically derive them from the
/// parent directory's and this file's own identifiers).
pub fn encrypt_data_map(parent_id: &[u8; 64], this_id: &[u8; 64], data_map: &DataMap) -> Result<Vec<u8>> {
    let serialized = data_map.serialize()?;

    let encryption_hash = hash_concat(parent_id, this_id);
    let key = &encryption_hash.as_bytes()[0..32];
    let iv = &encryption_hash.as_bytes()[32..48];

    let xor_hash = hash_concat(this_id, parent_id);
    let pad = xor_hash.as_bytes();

    let ciphertext = aes256_cfb_encrypt(key, iv, &serialized)?;
    let obfuscated = xor_with_pad(&ciphertext, pad);

    let mut out = Vec::with_capacity(4 + obfuscated.len());
    out.extend_from_slice(&DATA_MAP_ENCRYPTION_VERSION_0.to_le_bytes());
    out.extend_from_slice(&obfuscated);
    Ok(out)
}

/// Decrypt a data map previously produced by [`encrypt_data_map`] with the
/// same `(parent_id, this_id)` pair.
///
/// Fails with [`EngineError::Corrupt`] if the version prefix is
/// unrecognized, or if the decrypted bytes do not parse as a data map (the
/// expected outcome of decrypting with the wrong identity pair, since this
/// format carries no authentication tag).
pub fn decrypt_data_map(parent_id: &[u8; 64], this_id: &[u8; 64], encrypted: &[u8]) -> Result<DataMap> {
    if encrypted.len() < 4 {
        return Err(EngineError::Corrupt(
            "encrypted data map shorter than its version prefix".to_string(),
        ));
    }
    let version = u32::from_le_bytes(encrypted[0..4].try_into().expect("checked length"));
    if version != DATA_MAP_ENCRYPTION_VERSION_0 {
        return Err(EngineError::Corrupt(format!(
            "unrecognized data map encryption version {version}"
        )));
    }
    let obfuscated = &encrypted[4..];

    let encryption_hash = hash_concat(parent_id, this_id);
    let key = &encryption_hash.as_bytes()[0..32];
    let iv = &encryption_hash.as_bytes()[32..48];

    let xor_hash = hash_concat(this_id, parent_id);
    let pad = xor_hash.as_bytes();

    let ciphertext = xor_with_pad(obfuscated, pad);
    let serialized = aes256_cfb_decrypt(key, iv, &ciphertext)?;

    DataMap::parse(&serialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_map::ChunkDetails;
    use selfencrypt_crypto::hash;

    fn sample_data_map() -> DataMap {
        let mut c = ChunkDetails::empty(1024);
        c.pre_hash = hash(b"plaintext");
        c.post_hash = hash(b"ciphertext");
        c.size = 1024;
        DataMap::from_chunks(vec![c.clone(), c.clone(), c])
    }

    #[test]
    fn test_roundtrip() {
        let parent = [0x11u8; 64];
        let this = [0x22u8; 64];
        let dm = sample_data_map();

        let encrypted = encrypt_data_map(&parent, &this, &dm).unwrap();
        let decrypted = decrypt_data_map(&parent, &this, &encrypted).unwrap();

        assert_eq!(decrypted.chunk_count(), dm.chunk_count());
        assert_eq!(decrypted.chunks[0].pre_hash, dm.chunks[0].pre_hash);
    }

    #[test]
    fn test_roundtrip_inline() {
        let parent = [0xAAu8; 64];
        let this = [0xBBu8; 64];
        let dm = DataMap::from_inline(b"small file".to_vec());

        let encrypted = encrypt_data_map(&parent, &this, &dm).unwrap();
        let decrypted = decrypt_data_map(&parent, &this, &encrypted).unwrap();
        assert_eq!(decrypted.inline_content, dm.inline_content);
    }

    #[test]
    fn test_wrong_parent_id_fails() {
        let parent = [0x11u8; 64];
        let this = [0x22u8; 64];
        let wrong_parent = [0x12u8; 64];
        let dm = sample_data_map();

        let encrypted = encrypt_data_map(&parent, &this, &dm).unwrap();
        let result = decrypt_data_map(&wrong_parent, &this, &encrypted);
        assert!(result.is_err());
    }

    #[test]
    fn test_version_prefix_is_little_endian() {
        let parent = [0x01u8; 64];
        let this = [0x02u8; 64];
        let dm = sample_data_map();

        let encrypted = encrypt_data_map(&parent, &this, &dm).unwrap();
        assert_eq!(&encrypted[0..4], &1u32.to_le_bytes());
    }

    #[test]
    fn test_unrecognized_version_rejected() {
        let parent = [0x01u8; 64];
        let this = [0x02u8; 64];
        let dm = sample_data_map();

        let mut encrypted = encrypt_data_map(&parent, &this, &dm).unwrap();
        encrypted[0..4].copy_from_slice(&99u32.to_le_bytes());
        let result = decrypt_data_map(&parent, &this, &encrypted);
        assert!(matches!(result, Err(EngineError::Corrupt(_))));
    }
}
