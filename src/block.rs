use core::fmt;
use core::ptr::NonNull;

/// A snapshot of a single block of the heap, as seen by diagnostic tooling.
///
/// The addresses identify the blocks; they are only meant to be compared and
/// printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the block header.
    pub header: NonNull<u8>,
    /// Address of the first payload byte, as returned by an allocation.
    pub payload: NonNull<u8>,
    /// Number of payload bytes.
    pub size: usize,
    /// Whether the block is available for allocation.
    pub freed: bool,
    /// Header address of the preceding block.
    pub prev: Option<NonNull<u8>>,
    /// Header address of the following block.
    pub next: Option<NonNull<u8>>,
}
impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size: {}, header: {:p}, prev: {}, next: {}, freed: {}",
            self.size,
            self.header,
            Link(self.prev),
            Link(self.next),
            self.freed
        )
    }
}

struct Link(Option<NonNull<u8>>);
impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ptr) => write!(f, "{ptr:p}"),
            None => f.write_str("null"),
        }
    }
}
