//! First-fit free-list allocator over a single fixed-size heap region
//!
//! This crate provides an allocator, that obtains one contiguous region of
//! memory exactly once (by default from the operating system) and serves all
//! allocation and release requests from it. The region never grows and is
//! never handed back.
//!
//! # Usage
//! The simplest way is to use the process-wide heap of [`MAX_HEAP_SIZE`]
//! bytes through the free functions of this crate:
//! ```
//! let ptr = listalloc::allocate(24).expect("heap exhausted");
//! assert_eq!(ptr.as_ptr() as usize % listalloc::WORD_SIZE, 0);
//! unsafe { ptr.as_ptr().write_bytes(0, 24) };
//! listalloc::release(ptr.as_ptr());
//! ```
//! Alternatively an own [`Allocator`] with a custom heap size can be created.
//! It implements [`GlobalAlloc`], so it can be used as the global allocator
//! as well:
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: listalloc::Allocator<{ 1024 * 1024 }, listalloc::SystemRegion> =
//!     listalloc::Allocator::new();
//!
//! let mut numbers = Vec::new();
//! numbers.push(42);
//! ```
//! Layouts with an alignment larger than [`WORD_SIZE`] are served by moving
//! the start of a free block forward until its payload is suitably aligned.
//!
//! # Implementation
//! Every block of the region starts with a header of [`HEADER_SIZE`] bytes
//! (32 on 64 bit targets), which stores the payload size, a "free"-flag and
//! the offsets of the neighbouring headers. All headers form a doubly linked
//! list in address order. The following pictures show a region of 440 bytes
//! with one character per 8 bytes.
//! 1.  The region is requested on the first allocation. It contains a single
//!     free block.
//!     ```text
//!     hhhh 000000000000000000000000000000000000000000000000000
//!     ^--- ^--------------------------------------------------
//!     FREE size = 408
//!     ```
//! 2.  A block of 16 is allocated. The list is scanned from the start for the
//!     first free block, that either fits exactly or is large enough to carve
//!     out the request plus another header. Here the only block gets split.
//!     ```text
//!     hhhh 00 hhhh 000000000000000000000000000000000000000000000
//!     ^--- ^- ^--- ^--------------------------------------------
//!     USED 16 FREE size = 360
//!     ```
//!     Requests are rounded up to multiples of [`WORD_SIZE`], so every payload
//!     stays aligned.
//! 3.  Another block of 16 is allocated and the first one is released again.
//!     ```text
//!     hhhh 00 hhhh 00 hhhh 000000000000000000000000000000000000000
//!     ^--- ^- ^--- ^- ^--- ^--------------------------------------
//!     FREE 16 USED 16 FREE size = 312
//!     ```
//!     The released block has no free neighbour, so it stays on its own.
//! 4.  A request of 16 reuses the first block: it is the first fit.
//! 5.  If splitting a block would leave a remainder not larger than a header,
//!     the whole block is handed out instead. Such a tiny block could never
//!     hold anything useful.
//! 6.  On release the block is merged with its free neighbours: the preceding
//!     block absorbs the released one, then the following block is absorbed.
//!     As no two neighbours are ever free before a release, one step in each
//!     direction is enough to keep it that way afterwards.
//!
//! Releasing a pointer, that was not handed out by the allocator (or was
//! already released) is silently ignored.
//!
//! # Logging
//! The crate emits records through the [`log`] facade. The records are
//! emitted after the internal lock is released, so a logger, that allocates
//! itself, does not deadlock.
#![no_std]

#[cfg(test)]
extern crate std;

mod align;
mod block;
mod error;
mod raw_allocator;
mod region;

pub use align::{align, checked_align, WORD_SIZE};
pub use block::BlockInfo;
pub use error::{AllocError, FreeError};
pub use raw_allocator::HEADER_SIZE;
#[cfg(unix)]
pub use region::SystemRegion;
pub use region::{RegionSource, SliceRegion};

use raw_allocator::{Cursor, RawAllocator};

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use log::{debug, error, trace, warn};
use spin::Mutex;

/// The heap size of the process-wide heap used by [`allocate()`] and
/// [`release()`].
pub const MAX_HEAP_SIZE: usize = 1024 * 1024;

/// The state behind the lock of an [`Allocator`].
struct State<S> {
    source: S,
    heap: Option<RawAllocator>,
}
impl<S: RegionSource> State<S> {
    /// Get the heap, obtaining the region first if necessary.
    fn heap(&mut self, size: usize) -> Result<&mut RawAllocator, AllocError> {
        let heap = match self.heap.take() {
            Some(heap) => heap,
            None => {
                let start = self.source.obtain(size).ok_or(AllocError::OutOfMemory)?;
                // SAFETY: the region source guarantees, that the region is
                // valid, aligned and exclusive.
                unsafe { RawAllocator::new(start, size) }
            }
        };
        Ok(self.heap.insert(heap))
    }
}

/// The memory allocator managing a heap of `N` bytes.
///
/// The heap is obtained from the [`RegionSource`] `S` on the first allocation.
/// If that fails, the allocation fails and the next one tries again. `N` is
/// rounded up to a multiple of [`WORD_SIZE`].
///
/// All operations go through a spin lock, so the allocator can be placed in a
/// `static`:
/// ```
/// use listalloc::{Allocator, SystemRegion};
///
/// static HEAP: Allocator<4096, SystemRegion> = Allocator::new();
///
/// let ptr = HEAP.allocate(100).unwrap();
/// HEAP.release(ptr.as_ptr());
/// ```
pub struct Allocator<const N: usize, S> {
    state: Mutex<State<S>>,
}
#[cfg(unix)]
impl<const N: usize> Allocator<N, SystemRegion> {
    /// Create a new [`Allocator`] using memory of the operating system.
    ///
    /// This function is a `const fn`, therefore you can call it directly when
    /// creating the allocator.
    ///
    /// # Panics
    /// This function will panic, if the supplied heap size, i.e. `N` cannot
    /// hold a single header and one word.
    #[must_use = "assign the allocator to a static variable to use it"]
    pub const fn new() -> Self {
        Self::with_source(SystemRegion::new())
    }
}
impl<const N: usize, S: RegionSource> Allocator<N, S> {
    const REGION_SIZE: usize = align(N);

    /// Create a new [`Allocator`] obtaining its heap from `source`.
    ///
    /// # Panics
    /// This function will panic, if the supplied heap size, i.e. `N` cannot
    /// hold a single header and one word.
    pub const fn with_source(source: S) -> Self {
        assert!(N >= HEADER_SIZE + WORD_SIZE, "too small heap memory");
        Self {
            state: Mutex::new(State { source, heap: None }),
        }
    }

    /// Allocate `n` bytes.
    ///
    /// `None` is returned, if the heap region could not be obtained or if
    /// there is no free block large enough. See [`try_allocate()`] for the
    /// distinction.
    ///
    /// # Panics
    /// This function panics, if `n` is zero.
    ///
    /// [`try_allocate()`]: Self::try_allocate
    pub fn allocate(&self, n: usize) -> Option<NonNull<u8>> {
        self.try_allocate(n).ok()
    }

    /// Allocate `n` bytes or report, why that is not possible.
    ///
    /// # Panics
    /// This function panics, if `n` is zero. The heap region is obtained
    /// nevertheless.
    pub fn try_allocate(&self, n: usize) -> Result<NonNull<u8>, AllocError> {
        self.allocate_aligned(n, WORD_SIZE)
    }

    /// Allocate `n` bytes, whose address is a multiple of `align`.
    ///
    /// The checks of the request happen after the lock is released, so a
    /// panicking caller never leaves the lock behind.
    fn allocate_aligned(&self, n: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let mut state = self.state.lock();
        let bootstrap = state.heap.is_none();
        let result = state
            .heap(Self::REGION_SIZE)
            .map(|heap| (n > 0).then(|| heap.alloc_aligned(n, align)));
        drop(state);

        if bootstrap && result.is_ok() {
            debug!("obtained heap region of {} bytes", Self::REGION_SIZE);
        }
        let result = match result {
            Ok(Some(ptr)) => ptr.ok_or(AllocError::Exhausted),
            Ok(None) => panic!("zero-sized allocation request"),
            Err(e) => Err(e),
        };
        match result {
            Ok(ptr) => trace!("allocated {n} bytes at {ptr:p}"),
            Err(AllocError::OutOfMemory) => {
                error!("could not obtain heap region of {} bytes", Self::REGION_SIZE);
            }
            Err(AllocError::Exhausted) => debug!("no free block for {n} bytes (align {align})"),
        }
        result
    }

    /// Release a pointer previously returned by [`allocate()`].
    ///
    /// A null pointer is ignored. So is every pointer, that does not belong to
    /// a currently allocated block: releasing it twice or releasing foreign
    /// memory does not change the heap (a warning is logged though).
    ///
    /// [`allocate()`]: Self::allocate
    pub fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let result = match self.state.lock().heap.as_mut() {
            Some(heap) => heap.free(ptr),
            None => Err(FreeError::AllocationNotFound),
        };
        match result {
            Ok(()) => trace!("released {ptr:p}"),
            Err(e) => warn!("ignoring release of {ptr:p}: {e}"),
        }
    }

    /// Query, whether the heap region was already obtained.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().heap.is_some()
    }

    /// Iterate over all blocks in address order.
    ///
    /// The lock is only held while a single block is looked up, never while
    /// the caller processes it. An allocator, that is not yet initialized, has
    /// no blocks.
    pub fn blocks(&self) -> Blocks<'_, N, S> {
        Blocks {
            allocator: self,
            cursor: Some(Cursor::start()),
        }
    }

    /// Log all blocks at debug level.
    pub fn dump(&self) {
        for block in self.blocks() {
            debug!("{block}");
        }
    }
}

/// An iterator over the blocks of an [`Allocator`].
///
/// This `struct` is created by [`Allocator::blocks()`].
pub struct Blocks<'a, const N: usize, S> {
    allocator: &'a Allocator<N, S>,
    /// Position of the next block to report.
    cursor: Option<Cursor>,
}
impl<'a, const N: usize, S> Iterator for Blocks<'a, N, S> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        let state = self.allocator.state.lock();
        let (block, next) = state.heap.as_ref()?.block_at(cursor)?;
        self.cursor = next;
        Some(block)
    }
}

unsafe impl<const N: usize, S: RegionSource> GlobalAlloc for Allocator<N, S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let align = layout.align().max(WORD_SIZE);
        self.allocate_aligned(layout.size().max(1), align)
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.release(ptr);
    }
}

#[cfg(unix)]
static HEAP: Allocator<MAX_HEAP_SIZE, SystemRegion> = Allocator::new();

/// Allocate `n` bytes from the process-wide heap.
///
/// `None` signals, that the heap is exhausted or could not be obtained.
///
/// # Panics
/// This function panics, if `n` is zero.
#[cfg(unix)]
pub fn allocate(n: usize) -> Option<NonNull<u8>> {
    HEAP.allocate(n)
}

/// Release a pointer returned by [`allocate()`] to the process-wide heap.
///
/// Null pointers and pointers, that are not currently allocated, are ignored.
#[cfg(unix)]
pub fn release(ptr: *mut u8) {
    HEAP.release(ptr);
}

/// Log all blocks of the process-wide heap at debug level.
#[cfg(unix)]
pub fn dump() {
    HEAP.dump();
}
