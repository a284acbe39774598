//! Error types of the allocator.
use core::fmt;

/// An allocation request could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The heap region could not be obtained from the region source. The
    /// allocator stays uninitialized, the next request tries again.
    OutOfMemory,
    /// There is no free block large enough for the request. The heap is of a
    /// fixed size and never grows.
    Exhausted,
}
impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("heap region could not be obtained"),
            Self::Exhausted => f.write_str("no free block large enough"),
        }
    }
}

/// An error occurred when calling `free()`.
///
/// The public release functions ignore those errors (releasing an unknown
/// pointer is a no-op), they are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// There is a double-free detected. An already freed-up-block is freed up
    /// again.
    DoubleFreeDetected,
    /// An invalid pointer was freed up (either a pointer outside of the heap
    /// memory or a pointer, that is not the start of a payload).
    AllocationNotFound,
}
impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleFreeDetected => f.write_str("block is already free"),
            Self::AllocationNotFound => f.write_str("pointer does not belong to an allocation"),
        }
    }
}
