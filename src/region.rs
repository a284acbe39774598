//! Sources for the single heap region.
//!
//! The allocator asks its [`RegionSource`] exactly once (successfully) for the
//! memory it manages. The region is never given back.
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// Something, that can hand out the heap region.
///
/// # Safety
/// A successfully returned region has to be valid for reads and writes of
/// `size` bytes for the rest of the program, it has to be aligned to
/// [`WORD_SIZE`](crate::WORD_SIZE) and must not be used by anything else. A
/// source must never hand out the same memory twice.
pub unsafe trait RegionSource {
    /// Request a region of `size` bytes.
    ///
    /// `None` signals, that the region could not be obtained. The request may
    /// be repeated later on.
    fn obtain(&mut self, size: usize) -> Option<NonNull<u8>>;
}

/// The operating system as region source.
///
/// The region is a private anonymous memory mapping, which is never unmapped.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct SystemRegion(());
#[cfg(unix)]
impl SystemRegion {
    /// Create a new [`SystemRegion`].
    pub const fn new() -> Self {
        Self(())
    }
}
#[cfg(unix)]
// SAFETY: every successful `mmap` returns fresh, page-aligned memory, which
// is never unmapped.
unsafe impl RegionSource for SystemRegion {
    fn obtain(&mut self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: an anonymous mapping without a fixed address does not affect
        // any existing memory.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return None;
        }
        NonNull::new(ptr.cast())
    }
}

/// A region backed by a caller-supplied static slice.
///
/// The slice is handed out on the first request, that it can satisfy: it has
/// to be at least as large as requested and aligned to
/// [`WORD_SIZE`](crate::WORD_SIZE).
pub struct SliceRegion {
    memory: Option<&'static mut [MaybeUninit<u8>]>,
}
impl SliceRegion {
    /// Create a region source from a byte slice.
    ///
    /// Nothing is checked here; a too small or misaligned slice makes the
    /// bootstrap of the allocator fail.
    pub fn new(memory: &'static mut [MaybeUninit<u8>]) -> Self {
        Self {
            memory: Some(memory),
        }
    }

    /// Create a region source from a slice of words, which is always suitably
    /// aligned.
    pub fn from_words(words: &'static mut [MaybeUninit<u64>]) -> Self {
        let len = words.len() * core::mem::size_of::<u64>();
        // SAFETY: the words are reinterpreted as bytes, which have no validity
        // requirements (they are `MaybeUninit` anyway). The lifetime and
        // exclusivity are carried over from the original slice.
        let bytes = unsafe {
            core::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<MaybeUninit<u8>>(), len)
        };
        Self::new(bytes)
    }
}
// SAFETY: the slice is `'static` and exclusively borrowed. It is handed out at
// most once, since it is taken out of the option.
unsafe impl RegionSource for SliceRegion {
    fn obtain(&mut self, size: usize) -> Option<NonNull<u8>> {
        let memory = self.memory.as_deref_mut()?;
        let aligned = memory.as_ptr() as usize % crate::WORD_SIZE == 0;
        if memory.len() < size || !aligned {
            return None;
        }
        let memory = self.memory.take()?;
        NonNull::new(memory.as_mut_ptr().cast())
    }
}
