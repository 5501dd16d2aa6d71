//! Cache-line-aligned raw allocation, mirroring `cauchy_aligned_alloc`/
//! `cauchy_aligned_free` in `memory.c`. `std::alloc` already gives us a
//! portable aligned allocator, so unlike the C source's three-way
//! `posix_memalign`/`_aligned_malloc`/manual-padding split, this is just a
//! thin `Layout` wrapper.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Allocates `size` bytes aligned to `align` (which must be a nonzero power
/// of two). Returns `None` on allocation failure or a degenerate layout,
/// exactly as `cauchy_aligned_alloc` returns `NULL`.
pub(crate) fn aligned_alloc(size: usize, align: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        return None;
    }
    let layout = Layout::from_size_align(size, align).ok()?;
    // SAFETY: `layout` has nonzero size, checked above.
    let ptr = unsafe { alloc::alloc(layout) };
    NonNull::new(ptr)
}

/// Frees memory obtained from [`aligned_alloc`] with the same `size`/`align`.
///
/// # Safety
///
/// `ptr` must have been returned by [`aligned_alloc`] with this exact
/// `size`/`align`, and must not be freed twice.
pub(crate) unsafe fn aligned_free(ptr: NonNull<u8>, size: usize, align: usize) {
    let layout = Layout::from_size_align_unchecked(size, align);
    alloc::dealloc(ptr.as_ptr(), layout);
}
