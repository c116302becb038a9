//! Sequencer: an out-of-order write staging area.
//!
//! An ordered interval map keyed by absolute file position, holding bytes
//! that have arrived out of order relative to the engine's main encrypt
//! queue. Entries are kept disjoint and non-adjacent: `add` coalesces any
//! overlapping or touching neighbors into one entry, with later writes
//! overwriting earlier ones on overlap (last-write-wins).

use crate::error::{EngineError, Result};
use std::collections::BTreeMap;

/// An ordered interval map of staged, out-of-order writes.
#[derive(Debug, Default)]
pub struct Sequencer {
    /// Maps an entry's start position to its bytes. Invariant: no two
    /// entries overlap or touch (enforced by `add`'s coalescing).
    entries: BTreeMap<u64, Vec<u8>>,
}

impl Sequencer {
    /// Create an empty sequencer.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Total bytes currently staged across all entries.
    pub fn length(&self) -> u64 {
        self.entries.values().map(|v| v.len() as u64).sum()
    }

    /// Whether any entries are staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The position of the first staged entry, if any.
    pub fn first_position(&self) -> Option<u64> {
        self.entries.keys().next().copied()
    }

    /// Insert `bytes` at `position`, coalescing with any overlapping or
    /// adjacent existing entries. Bytes from `bytes` win over any bytes
    /// already staged in the overlapping range.
    pub fn add(&mut self, position: u64, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let new_end = position
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| EngineError::Sequencer("position overflow".to_string()))?;

        // Find every existing entry that overlaps-or-touches [position, new_end].
        let mut merge_start = position;
        let mut merge_end = new_end;
        let mut to_remove = Vec::new();

        for (&start, existing) in self.entries.range(..=new_end) {
            let end = start + existing.len() as u64;
            if end < merge_start || start > merge_end {
                continue;
            }
            to_remove.push(start);
            merge_start = merge_start.min(start);
            merge_end = merge_end.max(end);
        }

        // Lay down old bytes first (as the base layer), then the new bytes
        // on top, so overlapping old data is overwritten (last-write-wins).
        let mut merged = vec![0u8; (merge_end - merge_start) as usize];
        for start in &to_remove {
            let existing = self.entries.remove(start).expect("collected above");
            let offset = (*start - merge_start) as usize;
            merged[offset..offset + existing.len()].copy_from_slice(&existing);
        }
        let offset = (position - merge_start) as usize;
        merged[offset..offset + bytes.len()].copy_from_slice(bytes);

        self.entries.insert(merge_start, merged);
        Ok(())
    }

    /// Return a copy of the bytes staged starting at exactly `position`,
    /// without removing them.
    pub fn peek(&self, position: u64) -> Option<&[u8]> {
        self.entries.get(&position).map(|v| v.as_slice())
    }

    /// Remove and return the bytes staged starting at exactly `position`.
    pub fn get(&mut self, position: u64) -> Option<Vec<u8>> {
        self.entries.remove(&position)
    }

    /// Drop every staged byte at or beyond `new_size`, trimming the entry
    /// that straddles the boundary if any. Used when a shrinking truncate
    /// discards pending writes past the new end of file.
    pub fn truncate(&mut self, new_size: u64) {
        let beyond: Vec<u64> = self.entries.range(new_size..).map(|(&s, _)| s).collect();
        for start in beyond {
            self.entries.remove(&start);
        }
        if let Some((&start, _)) = self.entries.range(..new_size).next_back() {
            let end = start + self.entries[&start].len() as u64;
            if end > new_size {
                let keep = (new_size - start) as usize;
                self.entries.get_mut(&start).unwrap().truncate(keep);
            }
        }
    }

    /// Copy bytes from any staged entries overlapping `[from, to)` into
    /// `out` (sized `to - from`), leaving bytes not covered by any entry
    /// untouched in `out`. If `remove` is true, fully-consumed entries are
    /// removed and partially-consumed entries are trimmed.
    ///
    /// Returns the number of bytes actually copied.
    pub fn fill_range(&mut self, from: u64, to: u64, out: &mut [u8], remove: bool) -> u32 {
        if to <= from {
            return 0;
        }
        let mut copied = 0u32;
        let mut remaining: Vec<(u64, u64)> = Vec::new();

        let keys: Vec<u64> = self
            .entries
            .range(..to)
            .map(|(&start, _)| start)
            .filter(|&start| {
                let len = self.entries[&start].len() as u64;
                start + len > from
            })
            .collect();

        for start in keys {
            let bytes = &self.entries[&start];
            let entry_end = start + bytes.len() as u64;
            let overlap_start = start.max(from);
            let overlap_end = entry_end.min(to);
            if overlap_end <= overlap_start {
                continue;
            }
            let src_offset = (overlap_start - start) as usize;
            let src_len = (overlap_end - overlap_start) as usize;
            let dst_offset = (overlap_start - from) as usize;
            out[dst_offset..dst_offset + src_len]
                .copy_from_slice(&bytes[src_offset..src_offset + src_len]);
            copied += src_len as u32;
            remaining.push((start, entry_end));
        }

        if remove {
            for (start, _) in remaining {
                self.entries.remove(&start);
            }
        }

        copied
    }
}
