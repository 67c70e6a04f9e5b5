//! A spin-locked pool usable as a global allocator.
//!
//! The pool itself has no internal synchronization; [`LockedPool`] provides
//! the external lock so that one pool can be shared between threads or
//! installed with `#[global_allocator]`:
//!
//! ```rust,ignore
//! use pool_alloc::LockedPool;
//!
//! #[global_allocator]
//! static ALLOCATOR: LockedPool = LockedPool::new();
//! ```
//!
//! When installed globally, no `tracing` subscriber that allocates may be
//! active, as events are emitted while the lock is held.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use spin::{Mutex, MutexGuard};

use crate::{
    config::PoolConfig,
    pool::PoolAllocator,
    size_class::BLOCK_ALIGN,
    system::{Global, SystemAlloc},
};

/// Layouts the pool can serve; stricter alignments go to the system.
fn served_by_pool(layout: &Layout) -> bool {
    layout.align() <= BLOCK_ALIGN
}

/// A [`PoolAllocator`] behind a spin lock.
pub struct LockedPool<S = Global>
where
    S: SystemAlloc,
{
    inner: Mutex<PoolAllocator<S>>,
}

impl Default for LockedPool<Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl LockedPool<Global> {
    /// Creates an empty locked pool backed by the global allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_system(Global)
    }
}

impl<S> LockedPool<S>
where
    S: SystemAlloc,
{
    /// Creates an empty locked pool backed by `system`.
    #[must_use]
    pub const fn with_system(system: S) -> Self {
        Self::with_config(system, PoolConfig::new())
    }

    /// Creates an empty locked pool backed by `system` with a custom refill
    /// policy.
    #[must_use]
    pub const fn with_config(system: S, config: PoolConfig) -> Self {
        Self {
            inner: Mutex::new(PoolAllocator::with_config(system, config)),
        }
    }

    /// Locks the pool for direct use.
    pub fn lock(&self) -> MutexGuard<'_, PoolAllocator<S>> {
        self.inner.lock()
    }
}

impl<S> core::fmt::Debug for LockedPool<S>
where
    S: SystemAlloc,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.inner.try_lock() {
            Some(pool) => f.debug_struct("LockedPool").field("inner", &*pool).finish(),
            None => f.debug_struct("LockedPool").finish_non_exhaustive(),
        }
    }
}

unsafe impl<S> GlobalAlloc for LockedPool<S>
where
    S: SystemAlloc + Send,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut pool = self.inner.lock();
        let ptr = if served_by_pool(&layout) {
            pool.allocate(layout.size()).ok()
        } else {
            pool.system_mut().allocate(layout)
        };
        ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        let mut pool = self.inner.lock();
        unsafe {
            if served_by_pool(&layout) {
                pool.deallocate(ptr, layout.size());
            } else {
                pool.system_mut().deallocate(ptr, layout);
            }
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if served_by_pool(&layout) {
            if let Some(old) = NonNull::new(ptr) {
                let mut pool = self.inner.lock();
                return unsafe { pool.reallocate_preserving(old, layout.size(), new_size) }
                    .map_or(ptr::null_mut(), NonNull::as_ptr);
            }
        }

        // SAFETY: the caller guarantees `new_size` rounded to `layout.align()`
        // does not overflow.
        let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };
        let new_ptr = unsafe { self.alloc(new_layout) };
        if !new_ptr.is_null() {
            unsafe {
                ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
                self.dealloc(ptr, layout);
            }
        }
        new_ptr
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::{size_class::SizeClass, testing::RecordingSystem};

    fn layout(size: usize, align: usize) -> Layout {
        Layout::from_size_align(size, align).unwrap()
    }

    #[test]
    fn test_small_layouts_use_pool() {
        let pool = LockedPool::new();
        unsafe {
            let l = layout(64, 8);
            let ptr = pool.alloc(l);
            assert!(!ptr.is_null());
            ptr.write_bytes(0x33, 64);
            pool.dealloc(ptr, l);
            assert_eq!(pool.alloc(l), ptr);
            pool.dealloc(ptr, l);
        }
        let guard = pool.lock();
        assert_eq!(guard.stats().refills, 1);
        assert_eq!(guard.free_blocks(SizeClass::for_size(64).unwrap()), 10);
    }

    #[test]
    fn test_strict_alignment_bypasses_pool() {
        let mut system = RecordingSystem::new();
        {
            let pool = LockedPool::with_system(&mut system);
            unsafe {
                let l = layout(64, 64);
                let ptr = pool.alloc(l);
                assert!(ptr.addr().is_multiple_of(64));
                pool.dealloc(ptr, l);
            }
            let guard = pool.lock();
            assert_eq!(guard.stats().refills, 0);
            assert_eq!(guard.system().request_sizes(), [64]);
        }
        assert_eq!(system.live_allocations(), 0);
    }

    #[test]
    fn test_realloc_preserves_contents() {
        let pool = LockedPool::new();
        unsafe {
            let l = layout(32, 8);
            let ptr = pool.alloc(l);
            for i in 0..32_u8 {
                ptr.add(usize::from(i)).write(i);
            }
            let grown = pool.realloc(ptr, l, 6000);
            assert!(!grown.is_null());
            for i in 0..32_u8 {
                assert_eq!(grown.add(usize::from(i)).read(), i);
            }
            pool.dealloc(grown, layout(6000, 8));
        }
        assert_eq!(pool.lock().stats().live_large, 0);
    }

    #[test]
    fn test_realloc_strict_alignment() {
        let pool = LockedPool::new();
        unsafe {
            let l = layout(128, 128);
            let ptr = pool.alloc(l);
            ptr.write_bytes(0x7a, 128);
            let moved = pool.realloc(ptr, l, 256);
            assert!(moved.addr().is_multiple_of(128));
            assert_eq!(moved.add(127).read(), 0x7a);
            pool.dealloc(moved, layout(256, 128));
        }
    }

    #[test]
    fn test_shared_between_threads() {
        let pool = Arc::new(LockedPool::new());
        let handles = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let l = layout(16 + t * 40, 8);
                    let mut ptrs = Vec::new();
                    for _ in 0..200 {
                        let ptr = unsafe { pool.alloc(l) };
                        assert!(!ptr.is_null());
                        unsafe { ptr.write_bytes(0x33, l.size()) };
                        ptrs.push(ptr.expose_provenance());
                    }
                    for ptr in ptrs {
                        unsafe { pool.dealloc(ptr::with_exposed_provenance_mut(ptr), l) };
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.lock().stats().refills >= 4);
    }
}
