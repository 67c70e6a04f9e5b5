//! The pool allocator facade.
//!
//! [`PoolAllocator`] routes each request by size:
//!
//! - `1..=MAX_SMALL_BYTES` bytes: popped from the free list of the request's
//!   size class, refilling the list from the pool region when it is empty
//! - larger requests: forwarded to the system allocator untouched
//!
//! Per size class the pool moves between two states:
//!
//! ```text
//!              allocate (refill leaves n - 1 blocks)
//!   ┌───────┐ ──────────────────────────────────────► ┌─────────┐
//!   │ Empty │                                         │ Stocked │ ◄─┐ deallocate /
//!   └───────┘ ◄────────────────────────────────────── └─────────┘ ──┘ allocate
//!              allocate (last block handed out)
//! ```

use core::ptr::{self, NonNull};

use snafu::{OptionExt as _, ensure};

use crate::{
    chunk::ChunkSupplier,
    config::PoolConfig,
    error::{AllocError, OutOfMemorySnafu, ZeroSizeSnafu},
    free_list::FreeListTable,
    size_class::{BLOCK_ALIGN, SizeClass},
    system::{Global, SystemAlloc, system_layout},
};

/// Whether a size class currently has free blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum ClassState {
    /// No free blocks; the next allocation triggers a refill.
    #[display("empty")]
    Empty,
    /// At least one free block is available.
    #[display("stocked")]
    Stocked,
}

/// Snapshot of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total bytes ever requested from the system for pool growth.
    pub heap_size: usize,
    /// Regions currently held from the system.
    pub system_regions: usize,
    /// Bytes left in the current pool region.
    pub region_remaining: usize,
    /// Successful refills.
    pub refills: usize,
    /// Pool growths served by the system allocator.
    pub system_grows: usize,
    /// Free blocks adopted as pool regions after a system failure.
    pub adoptions: usize,
    /// Region tail bytes recycled onto free lists.
    pub salvaged_bytes: usize,
    /// Large allocations currently outstanding.
    pub live_large: usize,
}

/// A segmented free-list allocator for small fixed-size requests.
///
/// # Thread Safety
///
/// The allocator is `Send` but not `Sync`. Wrap it in a lock (see
/// [`LockedPool`](crate::LockedPool)) or keep one pool per thread.
///
/// # Examples
///
/// ```
/// use pool_alloc::PoolAllocator;
///
/// let mut pool = PoolAllocator::new();
/// let block = pool.allocate(64).unwrap();
/// unsafe {
///     block.write_bytes(0, 64);
///     pool.deallocate(block, 64);
/// }
///
/// // LIFO reuse: the same block comes straight back.
/// assert_eq!(pool.allocate(64).unwrap(), block);
/// ```
pub struct PoolAllocator<S = Global>
where
    S: SystemAlloc,
{
    lists: FreeListTable,
    supplier: ChunkSupplier<S>,
    config: PoolConfig,
    live_large: usize,
}

unsafe impl<S> Send for PoolAllocator<S> where S: SystemAlloc + Send {}

impl Default for PoolAllocator<Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolAllocator<Global> {
    /// Creates an empty pool backed by the global allocator.
    ///
    /// No memory is reserved until the first allocation.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_system(Global)
    }
}

impl<S> PoolAllocator<S>
where
    S: SystemAlloc,
{
    /// Creates an empty pool backed by `system`.
    #[must_use]
    pub const fn with_system(system: S) -> Self {
        Self::with_config(system, PoolConfig::new())
    }

    /// Creates an empty pool backed by `system` with a custom refill policy.
    #[must_use]
    pub const fn with_config(system: S, config: PoolConfig) -> Self {
        Self {
            lists: FreeListTable::new(),
            supplier: ChunkSupplier::new(system),
            config,
            live_large: 0,
        }
    }

    /// Allocates `size` bytes.
    ///
    /// Small requests receive a block of exactly `round_up(size)` bytes,
    /// aligned to [`BLOCK_ALIGN`]. Requests above
    /// [`MAX_SMALL_BYTES`](crate::MAX_SMALL_BYTES) are forwarded to the system
    /// allocator and aligned to [`LARGE_ALIGN`](crate::LARGE_ALIGN). The
    /// memory is uninitialized.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        ensure!(size > 0, ZeroSizeSnafu);
        let Some(class) = SizeClass::for_size(size) else {
            return self.allocate_large(size);
        };
        if let Some(block) = self.lists.pop(class) {
            return Ok(block);
        }
        self.supplier.refill(
            &mut self.lists,
            class,
            self.config.blocks_per_refill(),
            self.config.max_chunk_bytes(),
        )
    }

    fn allocate_large(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = system_layout(size).context(OutOfMemorySnafu { size })?;
        let Some(ptr) = self.supplier.system_mut().allocate(layout) else {
            tracing::error!(size, "system allocator refused large allocation");
            return OutOfMemorySnafu { size }.fail();
        };
        self.live_large += 1;
        Ok(ptr)
    }

    /// Returns a block to the pool.
    ///
    /// Small blocks go back onto the free list of their class; large blocks
    /// are released to the system allocator. Zero-sized deallocations are
    /// ignored.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by [`allocate`](Self::allocate) on this pool
    /// - `size` maps to the same size class as the size it was allocated with
    ///   (for large blocks: is the same size)
    /// - `ptr` has not been deallocated already and is not used afterwards
    ///
    /// None of this is checked; violating it corrupts a free list.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, size: usize) {
        if let Some(class) = SizeClass::for_size(size) {
            debug_assert!(ptr.as_ptr().addr().is_multiple_of(BLOCK_ALIGN));
            unsafe {
                self.lists.push(class, ptr);
            }
            return;
        }
        let Some(layout) = system_layout(size) else {
            return;
        };
        self.live_large = self.live_large.saturating_sub(1);
        unsafe {
            self.supplier.system_mut().deallocate(ptr, layout);
        }
    }

    /// Releases `ptr` and allocates `new_size` bytes.
    ///
    /// The contents of the old block are **not** carried over; use
    /// [`reallocate_preserving`](Self::reallocate_preserving) for that. If the
    /// new allocation fails the old block has already been released.
    ///
    /// # Safety
    ///
    /// Same requirements as [`deallocate`](Self::deallocate) for `ptr` and
    /// `old_size`.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        unsafe {
            self.deallocate(ptr, old_size);
        }
        self.allocate(new_size)
    }

    /// Moves the contents of `ptr` into a block of `new_size` bytes.
    ///
    /// Returns `ptr` itself when both sizes map to the same size class.
    /// Otherwise the first `min(old_size, new_size)` bytes are copied into a
    /// fresh block before `ptr` is released. On failure `ptr` stays valid.
    ///
    /// # Safety
    ///
    /// Same requirements as [`deallocate`](Self::deallocate) for `ptr` and
    /// `old_size`.
    pub unsafe fn reallocate_preserving(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let old_class = SizeClass::for_size(old_size);
        if old_class.is_some() && old_class == SizeClass::for_size(new_size) {
            return Ok(ptr);
        }
        let new_ptr = self.allocate(new_size)?;
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size.min(new_size));
            self.deallocate(ptr, old_size);
        }
        Ok(new_ptr)
    }

    /// Returns the number of usable bytes an allocation of `size` receives.
    #[must_use]
    pub fn usable_size(size: usize) -> usize {
        match SizeClass::for_size(size) {
            Some(class) => class.block_size(),
            None => size,
        }
    }

    /// Returns whether `class` currently has free blocks.
    #[must_use]
    pub fn class_state(&self, class: SizeClass) -> ClassState {
        if self.lists.is_empty(class) {
            ClassState::Empty
        } else {
            ClassState::Stocked
        }
    }

    /// Counts the free blocks of `class`.
    ///
    /// This walks the free list and is linear in its length.
    #[must_use]
    pub fn free_blocks(&self, class: SizeClass) -> usize {
        self.lists.len(class)
    }

    /// Returns a snapshot of the pool's counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let counters = self.supplier.counters();
        PoolStats {
            heap_size: self.supplier.heap_size(),
            system_regions: self.supplier.region_count(),
            region_remaining: self.supplier.region_remaining(),
            refills: counters.refills,
            system_grows: counters.system_grows,
            adoptions: counters.adoptions,
            salvaged_bytes: counters.salvaged_bytes,
            live_large: self.live_large,
        }
    }

    /// Returns the refill policy.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the backing system allocator.
    #[must_use]
    pub fn system(&self) -> &S {
        self.supplier.system()
    }

    /// Returns the backing system allocator mutably.
    ///
    /// Memory obtained directly from it is not tracked by the pool.
    pub fn system_mut(&mut self) -> &mut S {
        self.supplier.system_mut()
    }
}

impl<S> core::fmt::Debug for PoolAllocator<S>
where
    S: SystemAlloc,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
