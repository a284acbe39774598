use super::entry::{Entry, HEADER_SIZE};

use core::mem;
use core::ptr::NonNull;

/// An offset into the [`Buffer`], that is validated and known to be safe.
///
/// A `ValidatedOffset` always points at an initialized [`Entry`], that is part
/// of the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValidatedOffset(usize);
impl ValidatedOffset {
    /// Mark a raw offset as validated.
    ///
    /// # Safety
    /// The offset has to point at an entry, that is currently part of the
    /// block list of the buffer it is used with.
    pub const unsafe fn new_unchecked(offset: usize) -> Self {
        Self(offset)
    }

    /// The raw byte offset relative to the start of the region.
    pub const fn get(self) -> usize {
        self.0
    }
}

/// The memory region backing the heap.
///
/// This is a view onto the single region obtained at bootstrap. It does not
/// own the memory, but it is the only thing ever accessing the headers inside
/// of it.
pub struct Buffer {
    start: NonNull<u8>,
    len: usize,
}
impl Buffer {
    /// Create a new buffer over `len` bytes starting at `start`.
    ///
    /// The buffer will be uninitialized except for the first few bytes, which
    /// contain the first header. This header is a free [`Entry`] with the size
    /// of the remaining region.
    ///
    /// # Safety
    /// `start` has to be valid for reads and writes of `len` bytes for as long
    /// as the buffer (or any pointer handed out from it) is used, it has to be
    /// aligned to [`WORD_SIZE`](crate::WORD_SIZE) and nothing else may access
    /// that memory concurrently.
    ///
    /// # Panics
    /// This function panics if `len` is not a multiple of the word size or the
    /// region cannot hold a header and a single word of payload.
    pub unsafe fn new(start: NonNull<u8>, len: usize) -> Self {
        assert!(len % crate::WORD_SIZE == 0, "region size is not word-aligned");
        assert!(len >= HEADER_SIZE + crate::WORD_SIZE, "region too small");
        assert!(start.as_ptr() as usize % crate::WORD_SIZE == 0);

        let mut buffer = Self { start, len };
        // this is necessary, since there must be always a valid first entry
        buffer.place(0, Entry::free(len - HEADER_SIZE));
        buffer
    }

    /// The total number of bytes of the region, headers included.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// The address of the first byte of the region.
    pub const fn start(&self) -> NonNull<u8> {
        self.start
    }

    /// The end sentinel: one past the last byte of the region.
    ///
    /// This is only ever compared against, never dereferenced.
    pub fn end(&self) -> usize {
        self.start().as_ptr() as usize + self.len
    }

    /// Obtain a raw pointer to a (potential) [`Entry`] inside of the buffer.
    ///
    /// # Panics
    /// This function panics if the offset is not a multiple of the alignment of
    /// [`Entry`] or the offset plus the size of an [`Entry`] would point past
    /// the end of the buffer.
    #[allow(clippy::cast_ptr_alignment)] // alignment is asserted below
    fn header_ptr(&mut self, offset: usize) -> *mut Entry {
        assert!(offset % mem::align_of::<Entry>() == 0);
        assert!(offset + HEADER_SIZE <= self.len);

        // SAFETY: the offset is in bounds of the region (asserted above) and
        // the region is valid for the whole `len` (safety invariant of `new()`).
        // Alignment is fulfilled, since the region start is word-aligned and
        // the offset is a multiple of the alignment of `Entry`.
        unsafe {
            self.start.as_ptr().add(offset).cast::<Entry>()
        }
    }

    /// Write a fresh header at a raw offset and make it part of the list.
    ///
    /// The caller is responsible for linking the new entry into its
    /// neighbours, otherwise the list gets inconsistent.
    pub fn place(&mut self, offset: usize, entry: Entry) -> ValidatedOffset {
        // SAFETY: `header_ptr()` checks bounds and alignment. Writing does not
        // read the previous (maybe uninitialized) content.
        unsafe { self.header_ptr(offset).write(entry) };
        ValidatedOffset(offset)
    }

    /// The first entry of the list. There always is one.
    pub const fn first(&self) -> ValidatedOffset {
        ValidatedOffset(0)
    }

    /// The entry physically following the given one, if any.
    pub fn next(&self, offset: ValidatedOffset) -> Option<ValidatedOffset> {
        self[offset].next().map(ValidatedOffset)
    }

    /// The entry physically preceding the given one, if any.
    pub fn prev(&self, offset: ValidatedOffset) -> Option<ValidatedOffset> {
        self[offset].prev().map(ValidatedOffset)
    }

    /// Iterate over all entries in address order.
    pub fn entries(&self) -> EntryIter<'_> {
        EntryIter::new(self)
    }

    /// The address of the payload belonging to an entry.
    pub fn payload_of(&self, offset: ValidatedOffset) -> NonNull<u8> {
        // SAFETY: a validated offset is followed by at least a header, so the
        // payload address is at most one past the end of the region.
        unsafe { NonNull::new_unchecked(self.start.as_ptr().add(offset.0 + HEADER_SIZE)) }
    }

    /// The address of the header at a given offset.
    pub fn address_of(&self, offset: ValidatedOffset) -> NonNull<u8> {
        // SAFETY: validated offsets are inside of the region
        unsafe { NonNull::new_unchecked(self.start.as_ptr().add(offset.0)) }
    }

    /// Translate a payload pointer back to the offset of its candidate header.
    ///
    /// This only does address arithmetic: the result is not validated against
    /// the list. `None` is returned for pointers, that cannot belong to this
    /// region at all.
    pub fn header_offset_of(&self, ptr: *const u8) -> Option<usize> {
        let start = self.start.as_ptr() as usize;
        let addr = ptr as usize;
        if addr < start + HEADER_SIZE || addr >= self.end() {
            return None;
        }
        Some(addr - start - HEADER_SIZE)
    }
}
impl core::ops::Index<ValidatedOffset> for Buffer {
    type Output = Entry;

    fn index(&self, index: ValidatedOffset) -> &Self::Output {
        // SAFETY: the `ValidatedOffset` marks the read valid (safety invariant
        // of that type), it is in bounds and aligned.
        unsafe { &*self.start.as_ptr().add(index.0).cast::<Entry>() }
    }
}
impl core::ops::IndexMut<ValidatedOffset> for Buffer {
    fn index_mut(&mut self, index: ValidatedOffset) -> &mut Self::Output {
        // SAFETY: the `ValidatedOffset` marks the access valid (safety
        // invariant of that type) and `&mut self` guarantees exclusivity.
        unsafe { &mut *self.start.as_ptr().add(index.0).cast::<Entry>() }
    }
}

/// An iterator following the `next`-links of the block list.
pub struct EntryIter<'buffer> {
    buffer: &'buffer Buffer,
    cursor: Option<ValidatedOffset>,
}
impl<'buffer> EntryIter<'buffer> {
    /// Create an entry iterator over the given [`Buffer`].
    pub const fn new(buffer: &'buffer Buffer) -> Self {
        Self {
            buffer,
            cursor: Some(buffer.first()),
        }
    }
}
impl<'buffer> Iterator for EntryIter<'buffer> {
    type Item = ValidatedOffset;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.buffer.next(current);
        Some(current)
    }
}
