#![allow(dead_code)]

use listalloc::{Allocator, BlockInfo, RegionSource, SliceRegion, HEADER_SIZE, WORD_SIZE};

use std::mem::MaybeUninit;

/// A leaked, word-aligned region of `len` bytes.
pub fn region(len: usize) -> SliceRegion {
    let words = vec![MaybeUninit::uninit(); len / 8].into_boxed_slice();
    SliceRegion::from_words(Box::leak(words))
}

/// Collect the blocks as `(size, freed)` pairs.
pub fn layout<const N: usize, S: RegionSource>(
    allocator: &Allocator<N, S>,
) -> Vec<(usize, bool)> {
    allocator
        .blocks()
        .map(|block| (block.size, block.freed))
        .collect()
}

/// Assert all structural properties of the block list.
pub fn check<const N: usize, S: RegionSource>(allocator: &Allocator<N, S>) {
    let blocks: Vec<BlockInfo> = allocator.blocks().collect();
    if blocks.is_empty() {
        return;
    }

    let total: usize = blocks.iter().map(|block| HEADER_SIZE + block.size).sum();
    assert_eq!(total, listalloc::align(N), "blocks do not cover the region");

    assert_eq!(blocks[0].prev, None);
    assert_eq!(blocks[blocks.len() - 1].next, None);
    for block in &blocks {
        assert_eq!(block.payload.as_ptr() as usize % WORD_SIZE, 0);
        assert_eq!(
            block.payload.as_ptr() as usize - block.header.as_ptr() as usize,
            HEADER_SIZE
        );
    }
    for pair in blocks.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        assert!(
            !(left.freed && right.freed),
            "adjacent free blocks at {:p} and {:p}",
            left.header,
            right.header
        );
        assert_eq!(left.next, Some(right.header));
        assert_eq!(right.prev, Some(left.header));
        assert_eq!(
            left.payload.as_ptr() as usize + left.size,
            right.header.as_ptr() as usize
        );
    }
}
