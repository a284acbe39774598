//! Word alignment of request sizes.

/// The alignment of every block header and every returned payload.
pub const WORD_SIZE: usize = 8;

/// Round `n` up to the next multiple of [`WORD_SIZE`].
///
/// # Panics
/// This function panics (in debug builds) if the rounding overflows. Use
/// [`checked_align()`] for sizes, that come from untrusted input.
pub const fn align(n: usize) -> usize {
    (n + WORD_SIZE - 1) & !(WORD_SIZE - 1)
}

/// Round `n` up to the next multiple of [`WORD_SIZE`] or return `None` if the
/// result is not representable.
pub const fn checked_align(n: usize) -> Option<usize> {
    match n.checked_add(WORD_SIZE - 1) {
        Some(n) => Some(n & !(WORD_SIZE - 1)),
        None => None,
    }
}
