//! This module provides the raw allocator and its support types.
//!
//! A "raw allocator" is one, that manages an already obtained region and gets
//! requests for a specific number of bytes. It neither knows where the region
//! came from nor does it do any locking: both is the job of the
//! [`Allocator`](crate::Allocator).
mod buffer;
mod entry;

pub use entry::HEADER_SIZE;

use crate::{BlockInfo, FreeError};
use buffer::{Buffer, ValidatedOffset};
use entry::Entry;

use core::ptr::NonNull;

/// A first-fit allocator over the block list of a single region.
///
/// The region is split into blocks, each starting with a header. All headers,
/// free or used, form a doubly linked list in address order, so the list
/// always covers the whole region without gaps.
pub struct RawAllocator {
    buffer: Buffer,
    /// Incremented on every modification of the list.
    changes: usize,
}

// SAFETY: the raw allocator is the only user of its region (safety requirement
// of `new()`), so moving it to another thread moves the sole access to it.
unsafe impl Send for RawAllocator {}

/// A position inside of a traversal of the block list.
///
/// A cursor remembers the list state it was created in. As long as the list
/// was not modified since, its offset is known to point at a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    offset: usize,
    changes: Option<usize>,
}
impl Cursor {
    /// A cursor pointing to the first block.
    pub const fn start() -> Self {
        Self {
            offset: 0,
            changes: None,
        }
    }
}

impl RawAllocator {
    /// Create a new [`RawAllocator`] over a region of `len` bytes.
    ///
    /// The whole region is turned into a single free block.
    ///
    /// # Safety
    /// `start` has to be valid for reads and writes of `len` bytes for the
    /// rest of the lifetime of the allocator and every pointer handed out by
    /// it, it has to be aligned to [`WORD_SIZE`](crate::WORD_SIZE) and the
    /// memory must not be accessed by anything else.
    ///
    /// # Panics
    /// This function panics if the `len` is not a multiple of the word size or
    /// too small to hold a block of at least one word.
    pub unsafe fn new(start: NonNull<u8>, len: usize) -> Self {
        Self {
            buffer: Buffer::new(start, len),
            changes: 0,
        }
    }

    /// Allocate a new memory block of size `n`.
    ///
    /// The size is rounded up to a multiple of the word size. The list is
    /// scanned from the lowest address and the first free block, that either
    /// fits exactly or is large enough to be split, is marked as "used". If the
    /// remainder of a split would not be larger than a header, the whole block
    /// is handed out instead.
    ///
    /// If no block fits, `None` will be returned. Requesting zero bytes is a
    /// bug of the caller, which has to reject such requests beforehand.
    pub fn alloc(&mut self, n: usize) -> Option<NonNull<u8>> {
        self.alloc_aligned(n, crate::WORD_SIZE)
    }

    /// Allocate a new memory block of size `n`, whose payload is aligned to
    /// `align`.
    ///
    /// This works like [`alloc()`](Self::alloc), but a free block, whose
    /// payload is not suitably aligned, is cut in two: the front part stays
    /// free (it has to hold at least a header and a word) and the header of
    /// the allocation is moved forward, so that the payload is aligned. This
    /// way the header is always directly in front of the payload.
    ///
    /// `align` has to be a power of two.
    pub fn alloc_aligned(&mut self, n: usize, align: usize) -> Option<NonNull<u8>> {
        debug_assert!(n > 0, "zero-sized allocation request");
        debug_assert!(align.is_power_of_two());
        let n = crate::checked_align(n)?;
        if n > self.buffer.len() || align > self.buffer.len() {
            return None;
        }

        let start = self.buffer.start().as_ptr() as usize;
        let (offset, padding) = self.buffer.entries().find_map(|offset| {
            let entry = &self.buffer[offset];
            if !entry.is_free() {
                return None;
            }
            let padding = padding_for(start + offset.get() + HEADER_SIZE, align);
            let size = entry.size().checked_sub(padding)?;
            (size == n || size > HEADER_SIZE + n).then_some((offset, padding))
        })?;

        let offset = if padding == 0 {
            offset
        } else {
            self.split_at(offset, padding)
        };
        if self.buffer[offset].size() != n {
            self.split(offset, n);
        }
        self.buffer[offset].mark_used();
        self.changes = self.changes.wrapping_add(1);
        Some(self.buffer.payload_of(offset))
    }

    /// Move the start of the free block at `offset` forward by `padding`
    /// bytes. The skipped bytes form a free block on their own.
    fn split_at(&mut self, offset: ValidatedOffset, padding: usize) -> ValidatedOffset {
        let entry = self.buffer[offset];
        let moved = Entry::free(entry.size() - padding).linked(Some(offset.get()), entry.next());
        let moved = self.buffer.place(offset.get() + padding, moved);
        if let Some(next) = self.buffer.next(offset) {
            self.buffer[next].set_prev(Some(moved.get()));
        }

        let front = &mut self.buffer[offset];
        front.set_size(padding - HEADER_SIZE);
        front.set_next(Some(moved.get()));
        moved
    }

    /// Cut the block at `offset` into one of `n` bytes and a free remainder.
    ///
    /// Nothing happens, if the remainder would be too small to be useful.
    fn split(&mut self, offset: ValidatedOffset, n: usize) {
        let entry = self.buffer[offset];
        let leftover = entry.size() - n - HEADER_SIZE;
        if leftover <= HEADER_SIZE {
            return;
        }

        let remainder = Entry::free(leftover).linked(Some(offset.get()), entry.next());
        let remainder = self.buffer.place(offset.get() + HEADER_SIZE + n, remainder);
        if let Some(next) = self.buffer.next(offset) {
            self.buffer[next].set_prev(Some(remainder.get()));
        }

        let entry = &mut self.buffer[offset];
        entry.set_size(n);
        entry.set_next(Some(remainder.get()));
    }

    /// Free a pointer previously returned by [`alloc()`](Self::alloc).
    ///
    /// # Algorithm
    /// The header address is one header width in front of the pointer. The
    /// list is scanned for a header at exactly that address. If there is none,
    /// [`FreeError::AllocationNotFound`] is reported, if it is already free,
    /// [`FreeError::DoubleFreeDetected`] is reported. Neither touches the
    /// list.
    ///
    /// Otherwise the block is marked as free and merged with its free
    /// neighbours: first with the preceding block, then with the following
    /// one. Since no two neighbours are free before the call, this restores
    /// that property afterwards.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        let candidate = self
            .buffer
            .header_offset_of(ptr)
            .ok_or(FreeError::AllocationNotFound)?;
        let offset = self
            .buffer
            .entries()
            .find(|offset| offset.get() == candidate)
            .ok_or(FreeError::AllocationNotFound)?;

        let entry = &mut self.buffer[offset];
        if entry.is_free() {
            return Err(FreeError::DoubleFreeDetected);
        }
        entry.mark_free();
        self.coalesce(offset);
        self.changes = self.changes.wrapping_add(1);
        Ok(())
    }

    fn coalesce(&mut self, offset: ValidatedOffset) {
        let offset = match self.buffer.prev(offset) {
            Some(prev) if self.buffer[prev].is_free() => {
                self.absorb_next(prev);
                prev
            }
            _ => offset,
        };
        match self.buffer.next(offset) {
            Some(next) if self.buffer[next].is_free() => self.absorb_next(offset),
            _ => {}
        }
    }

    /// Merge the block following `offset` into the one at `offset`.
    fn absorb_next(&mut self, offset: ValidatedOffset) {
        let Some(next) = self.buffer.next(offset) else {
            return;
        };
        let absorbed = self.buffer[next];
        if let Some(after) = self.buffer.next(next) {
            self.buffer[after].set_prev(Some(offset.get()));
        }

        let entry = &mut self.buffer[offset];
        entry.set_size(entry.size() + HEADER_SIZE + absorbed.size());
        entry.set_next(absorbed.next());
    }

    /// Iterate over all blocks in address order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.buffer.entries().map(move |offset| self.info(offset))
    }

    /// The block at a cursor and the cursor of the following block.
    ///
    /// If the list was modified since the cursor was created, the traversal
    /// continues at the first block at or after the position of the cursor.
    /// Otherwise the block is looked up directly.
    pub fn block_at(&self, cursor: Cursor) -> Option<(BlockInfo, Option<Cursor>)> {
        let offset = if cursor.changes == Some(self.changes) {
            // SAFETY: the cursor was created by this allocator from a
            // validated offset and the list did not change since then.
            unsafe { ValidatedOffset::new_unchecked(cursor.offset) }
        } else {
            self.buffer.entries().find(|offset| offset.get() >= cursor.offset)?
        };
        let next = self.buffer.next(offset).map(|next| Cursor {
            offset: next.get(),
            changes: Some(self.changes),
        });
        Some((self.info(offset), next))
    }

    fn info(&self, offset: ValidatedOffset) -> BlockInfo {
        let entry = &self.buffer[offset];
        BlockInfo {
            header: self.buffer.address_of(offset),
            payload: self.buffer.payload_of(offset),
            size: entry.size(),
            freed: entry.is_free(),
            prev: self.buffer.prev(offset).map(|prev| self.buffer.address_of(prev)),
            next: self.buffer.next(offset).map(|next| self.buffer.address_of(next)),
        }
    }
}

/// The number of bytes, a header has to be moved forward, so that the payload
/// at `payload` gets aligned to `align`.
///
/// The skipped bytes have to hold a free block with at least one word, so the
/// padding is either zero or at least a header and a word.
fn padding_for(payload: usize, align: usize) -> usize {
    let mut padding = (align - payload % align) % align;
    if padding != 0 {
        while padding < HEADER_SIZE + crate::WORD_SIZE {
            padding += align;
        }
    }
    padding
}

impl RawAllocator {
    /// The total size of the managed region.
    #[cfg(test)]
    pub const fn region_size(&self) -> usize {
        self.buffer.len()
    }
}
