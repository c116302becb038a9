//! Chunk sizing policy: how a logical file size maps to a list of plaintext
//! chunk sizes.

/// Minimum chunk size in bytes.
pub const MIN_CHUNK: u32 = 1024;
/// Maximum (and default) chunk size in bytes: 1 MiB.
pub const MAX_CHUNK: u32 = 1024 * 1024;
/// Minimum number of chunks a non-inline data map may have.
pub const MIN_CHUNKS: usize = 3;

/// Whether a file of this size is stored inline (no chunks) in the data map.
pub fn is_inline(file_size: u64) -> bool {
    file_size < MIN_CHUNKS as u64 * MIN_CHUNK as u64
}

/// Compute the plaintext size of each chunk for a file of `file_size` bytes.
///
/// Returns an empty vector if the file is small enough to live inline
/// (callers should check [`is_inline`] first; this function still returns
/// the same answer as a convenience for property tests).
pub fn chunk_sizes(file_size: u64) -> Vec<u32> {
    if is_inline(file_size) {
        return Vec::new();
    }

    let min_chunks_max_chunk = MIN_CHUNKS as u64 * MAX_CHUNK as u64;
    if file_size < min_chunks_max_chunk {
        // Exactly MIN_CHUNKS chunks, the last absorbing the remainder.
        let base = (file_size / MIN_CHUNKS as u64) as u32;
        let remainder = (file_size % MIN_CHUNKS as u64) as u32;
        let mut sizes = vec![base; MIN_CHUNKS];
        *sizes.last_mut().unwrap() += remainder;
        sizes
    } else {
        let full_chunks = (file_size / MAX_CHUNK as u64) as usize;
        let tail = (file_size % MAX_CHUNK as u64) as u32;

        let mut sizes = vec![MAX_CHUNK; full_chunks];
        if tail == 0 {
            return sizes;
        }
        if tail < MIN_CHUNK {
            // Redistribute: shrink the penultimate chunk so both it and the
            // tail meet MIN_CHUNK.
            let deficit = MIN_CHUNK - tail;
            let last_full = sizes.last_mut().expect("full_chunks >= MIN_CHUNKS - 1 >= 2");
            *last_full -= deficit;
            sizes.push(tail + deficit);
        } else {
            sizes.push(tail);
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn total(sizes: &[u32]) -> u64 {
        sizes.iter().map(|&s| s as u64).sum()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(MIN_CHUNKS as u64 * MIN_CHUNK as u64 - 1)]
    fn test_small_files_are_inline(#[case] size: u64) {
        assert!(is_inline(size));
        assert!(chunk_sizes(size).is_empty());
    }

    #[rstest]
    #[case(MIN_CHUNKS as u64 * MIN_CHUNK as u64)]
    #[case(MIN_CHUNKS as u64 * MAX_CHUNK as u64 - 1)]
    #[case(10 * MAX_CHUNK as u64)]
    #[case(10 * MAX_CHUNK as u64 + 1)]
    #[case(10 * MAX_CHUNK as u64 + MIN_CHUNK as u64 - 1)]
    fn test_chunk_sizes_sum_to_file_size(#[case] size: u64) {
        assert!(!is_inline(size));
        let sizes = chunk_sizes(size);
        assert_eq!(total(&sizes), size);
    }

    #[test]
    fn test_mid_range_splits_into_exactly_min_chunks() {
        let size = MIN_CHUNKS as u64 * MIN_CHUNK as u64 + 7;
        let sizes = chunk_sizes(size);
        assert_eq!(sizes.len(), MIN_CHUNKS);
        assert_eq!(sizes[0], sizes[1]);
        assert_eq!(sizes[2], sizes[1] + 7);
    }

    #[test]
    fn test_three_min_chunk_exact_boundary() {
        let size = MIN_CHUNKS as u64 * MIN_CHUNK as u64;
        let sizes = chunk_sizes(size);
        assert_eq!(sizes, vec![MIN_CHUNK; MIN_CHUNKS]);
    }

    #[test]
    fn test_large_file_uses_full_max_chunks_plus_tail() {
        let size = 5 * MAX_CHUNK as u64 + 2000;
        let sizes = chunk_sizes(size);
        assert_eq!(sizes.len(), 6);
        assert_eq!(&sizes[0..5], &[MAX_CHUNK; 5]);
        assert_eq!(sizes[5], 2000);
    }

    #[test]
    fn test_large_file_exact_multiple_has_no_tail() {
        let size = 4 * MAX_CHUNK as u64;
        let sizes = chunk_sizes(size);
        assert_eq!(sizes, vec![MAX_CHUNK; 4]);
    }

    #[test]
    fn test_tiny_tail_is_redistributed_from_penultimate_chunk() {
        let size = 5 * MAX_CHUNK as u64 + (MIN_CHUNK as u64 - 10);
        let sizes = chunk_sizes(size);
        let last = *sizes.last().unwrap();
        let penultimate = sizes[sizes.len() - 2];
        assert!(last >= MIN_CHUNK, "tail redistributed up to MIN_CHUNK");
        assert!(penultimate >= MIN_CHUNK, "penultimate stays at or above MIN_CHUNK");
        assert_eq!(total(&sizes), size);
    }

    #[test]
    fn test_all_chunks_within_max() {
        for size in [
            MIN_CHUNKS as u64 * MIN_CHUNK as u64,
            MIN_CHUNKS as u64 * MAX_CHUNK as u64,
            20 * MAX_CHUNK as u64 + 1,
        ] {
            for s in chunk_sizes(size) {
                assert!(s <= MAX_CHUNK);
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_chunk_sizes_sum_and_bounds(size in 0u64..(20 * MAX_CHUNK as u64)) {
            if is_inline(size) {
                proptest::prop_assert!(chunk_sizes(size).is_empty());
            } else {
                let sizes = chunk_sizes(size);
                proptest::prop_assert!(sizes.len() >= MIN_CHUNKS);
                proptest::prop_assert_eq!(total(&sizes), size);
                for s in sizes {
                    proptest::prop_assert!(s <= MAX_CHUNK);
                }
            }
        }
    }
}
