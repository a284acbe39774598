//! The block header stored in front of every block of the heap region.
use core::mem;

/// The number of bytes a single [`Entry`] occupies in the region.
pub const HEADER_SIZE: usize = mem::size_of::<Entry>();

const _: () = assert!(HEADER_SIZE % crate::WORD_SIZE == 0);
const _: () = assert!(mem::align_of::<Entry>() <= crate::WORD_SIZE);

/// Marker for a missing link.
const NIL: usize = usize::MAX;

/// A block header.
///
/// Every block of the region, free or used, starts with such a header. It
/// records the size of the payload following it and the offsets of the
/// physically adjacent headers. The links are byte offsets relative to the
/// start of the region, so the header never holds a pointer into the region
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Entry {
    size: usize,
    freed: bool,
    next: usize,
    prev: usize,
}
impl Entry {
    /// Create an unlinked free entry with the given payload size.
    pub const fn free(size: usize) -> Self {
        Self {
            size,
            freed: true,
            next: NIL,
            prev: NIL,
        }
    }

    /// Create an unlinked used entry with the given payload size.
    #[cfg(test)]
    pub const fn used(size: usize) -> Self {
        Self {
            size,
            freed: false,
            next: NIL,
            prev: NIL,
        }
    }

    /// Attach the neighbour links to this entry.
    #[must_use]
    pub fn linked(mut self, prev: Option<usize>, next: Option<usize>) -> Self {
        self.prev = encode(prev);
        self.next = encode(next);
        self
    }

    /// The number of payload bytes (without the header).
    pub const fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Query, whether the block is available for allocation.
    pub const fn is_free(&self) -> bool {
        self.freed
    }

    pub fn mark_free(&mut self) {
        self.freed = true;
    }

    pub fn mark_used(&mut self) {
        self.freed = false;
    }

    /// Offset of the header physically following this one.
    pub const fn next(&self) -> Option<usize> {
        decode(self.next)
    }

    pub fn set_next(&mut self, next: Option<usize>) {
        self.next = encode(next);
    }

    /// Offset of the header physically preceding this one.
    pub const fn prev(&self) -> Option<usize> {
        decode(self.prev)
    }

    pub fn set_prev(&mut self, prev: Option<usize>) {
        self.prev = encode(prev);
    }
}

const fn encode(link: Option<usize>) -> usize {
    match link {
        Some(offset) => offset,
        None => NIL,
    }
}

const fn decode(link: usize) -> Option<usize> {
    if link == NIL {
        None
    } else {
        Some(link)
    }
}
