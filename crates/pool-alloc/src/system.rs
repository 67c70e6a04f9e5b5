//! The allocator the pool draws its regions (and large blocks) from.

use core::{alloc::Layout, ptr::NonNull};

/// Alignment of large blocks and of pool regions requested from the system.
pub const LARGE_ALIGN: usize = 16;

/// Builds the layout used for a system request of `size` bytes.
///
/// Returns `None` if `size` is zero or too large to form a valid layout.
pub(crate) fn system_layout(size: usize) -> Option<Layout> {
    if size == 0 {
        return None;
    }
    Layout::from_size_align(size, LARGE_ALIGN).ok()
}

/// Backing allocator used for pool growth and for requests too large for
/// the pool.
///
/// # Safety
///
/// Implementors must return memory that is valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and not handed out
/// again until it is passed back to [`deallocate`](Self::deallocate).
pub unsafe trait SystemAlloc {
    /// Allocates memory for `layout`, returning `None` on exhaustion.
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns memory obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with the
    /// same `layout` and must not have been deallocated already.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// The global Rust allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl SystemAlloc for Global {
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        // SAFETY: callers never request zero-sized layouts.
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

unsafe impl<A> SystemAlloc for &mut A
where
    A: SystemAlloc + ?Sized,
{
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}
