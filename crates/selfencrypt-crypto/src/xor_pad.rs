//! XOR Pad Filter
//!
//! Applies a cyclic XOR pad over a byte stream, one byte at a time, wrapping
//! the pad index with `% pad.len()`. This is the obfuscation layer applied on
//! top of the AES-256-CFB ciphertext when writing a chunk, and undone (XOR is
//! its own inverse) when reading one back.
//!
//! The pad for a chunk is always [`PAD_SIZE`] bytes: `3 * SHA512::DIGESTSIZE -
//! AES256_KeySize - AES256_IVSize` = `3*64 - 32 - 16` = 144, assembled by the
//! chunk pipeline from three chunks' pre-hashes.

/// Size of the XOR pad in bytes: `3 * 64 - 32 - 16`.
pub const PAD_SIZE: usize = 144;

/// Apply a cyclic XOR pad to `data`, returning a new buffer.
///
/// `pad` need not be exactly [`PAD_SIZE`] bytes; any non-empty pad cycles
/// correctly. Passing the same pad to the output of this function recovers
/// the original `data`.
pub fn xor_with_pad(data: &[u8], pad: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    xor_with_pad_into(data, pad, &mut out);
    out
}

/// Apply a cyclic XOR pad to `data` in place.
pub fn xor_with_pad_in_place(data: &mut [u8], pad: &[u8]) {
    assert!(!pad.is_empty(), "XOR pad must not be empty");
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= pad[i % pad.len()];
    }
}

/// Apply a cyclic XOR pad to `data`, writing into the caller-supplied `out`
/// slice. `out` must be at least as long as `data`.
pub fn xor_with_pad_into(data: &[u8], pad: &[u8], out: &mut [u8]) {
    assert!(!pad.is_empty(), "XOR pad must not be empty");
    assert!(out.len() >= data.len(), "output buffer too small");
    for (i, byte) in data.iter().enumerate() {
        out[i] = byte ^ pad[i % pad.len()];
    }
}

/// A streaming cyclic XOR filter that carries its cycle position across
/// multiple `apply` calls, for chunk data that arrives in pieces.
pub struct XorPadFilter<'a> {
    pad: &'a [u8],
    count: usize,
}

impl<'a> XorPadFilter<'a> {
    /// Create a new filter over `pad`, starting the cycle at position 0.
    pub fn new(pad: &'a [u8]) -> Self {
        assert!(!pad.is_empty(), "XOR pad must not be empty");
        Self { pad, count: 0 }
    }

    /// XOR `data` against the pad in place, advancing the internal cycle
    /// position so a subsequent call continues where this one left off.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.pad[self.count % self.pad.len()];
            self.count += 1;
        }
    }

    /// Number of bytes processed so far.
    pub fn count(&self) -> usize {
        self.count
    }
}
