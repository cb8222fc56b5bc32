//! Hierarchical binning and chunk optimization.
//!
//! Tabix shares the UCSC/BAI binning scheme: a fixed 5-level tiling of
//! 0-based coordinates up to 2^29, plus bin 0 covering everything.
//!
//! - Level 1: 8 bins (64 Mbp each), ids 1..=8
//! - Level 2: 64 bins (8 Mbp each), ids 9..=72
//! - Level 3: 512 bins (1 Mbp each), ids 73..=584
//! - Level 4: 4096 bins (128 Kbp each), ids 585..=4680
//! - Level 5: 32768 bins (16 Kbp each), ids 4681..=37448

use super::bgzf::VirtualOffset;
use super::tabix::Chunk;

/// log2 of the linear index tile width (16 Kbp).
pub const LINEAR_SHIFT: u32 = 14;

/// Largest coordinate the binning scheme addresses.
const MAX_COORDINATE: u32 = 1 << 29;

/// (first bin id, right shift) per level, coarsest first.
const LEVELS: [(u32, u32); 5] = [(1, 26), (9, 23), (73, 20), (585, 17), (4681, 14)];

/// Bin ids that may hold records overlapping the 0-based half-open `[begin, end)`.
pub fn bins_for_region(begin: u32, end: u32) -> Vec<u32> {
    let end = end.max(begin.saturating_add(1)).min(MAX_COORDINATE);
    let begin = begin.min(end - 1);
    let last = end - 1;

    let mut bins = vec![0];
    for (base, shift) in LEVELS {
        bins.extend((base + (begin >> shift))..=(base + (last >> shift)));
    }
    bins
}

/// Linear index tile for a 0-based coordinate.
pub fn linear_tile(position: u32) -> usize {
    (position >> LINEAR_SHIFT) as usize
}

/// Sort, prune and merge chunks into a minimal list of storage ranges.
///
/// Chunks ending before `min_offset` cannot hold records at or after the
/// query start and are dropped. The rest are sorted by `(begin, end)` and
/// chunks that overlap or touch in virtual-offset order are merged.
pub fn optimize_chunks(mut chunks: Vec<Chunk>, min_offset: VirtualOffset) -> Vec<Chunk> {
    chunks.retain(|chunk| chunk.end >= min_offset);
    chunks.sort_by(|l, r| l.begin.cmp(&r.begin).then(l.end.cmp(&r.end)));

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(last) if chunk.begin <= last.end => {
                last.end = last.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}
