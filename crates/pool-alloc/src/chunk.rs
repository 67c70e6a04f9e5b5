//! Refilling free lists from the pool region.
//!
//! # Algorithm
//!
//! A refill for class `c` asks for `n` blocks of `c.block_size()` bytes:
//!
//! 1. If the region holds `n` blocks, carve them all.
//! 2. If it holds at least one block, carve as many as fit.
//! 3. Otherwise split the region's leftover tail into the largest classes
//!    that fit and request a new region of
//!    `2 * need + round_up(heap_size / 16)` bytes (capped at
//!    `max(need, max_chunk_bytes)`) from the system.
//! 4. If the system refuses, adopt one free block of class `c` or larger as
//!    the region instead.
//! 5. If there is no such block, the request fails with
//!    [`AllocError::OutOfMemory`].
//!
//! Steps 3 and 4 always leave at least one block of `c` in the region, so
//! the retry loop terminates after its second round; it is bounded anyway.

use core::ptr::NonNull;

use crate::{
    error::{AllocError, OutOfMemorySnafu},
    free_list::FreeListTable,
    region::{PoolRegion, SystemRegions},
    size_class::{BLOCK_ALIGN, SizeClass, round_up},
    system::SystemAlloc,
};

/// Upper bound on carve attempts within a single refill.
pub const REFILL_ATTEMPTS: usize = 4;

/// Computes the size of the next pool-growth request.
///
/// Returns `None` on arithmetic overflow.
///
/// `max_chunk_bytes` is rounded down to [`BLOCK_ALIGN`] so that every region,
/// and therefore every region tail, is a whole number of 8-byte units.
pub(crate) fn growth_size(need: usize, heap_size: usize, max_chunk_bytes: usize) -> Option<usize> {
    let grown = need.checked_mul(2)?.checked_add(round_up(heap_size >> 4))?;
    let max_chunk_bytes = max_chunk_bytes & !(BLOCK_ALIGN - 1);
    if grown > max_chunk_bytes {
        Some(need.max(max_chunk_bytes))
    } else {
        Some(grown)
    }
}

/// Counters kept by the supplier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SupplierCounters {
    pub(crate) refills: usize,
    pub(crate) system_grows: usize,
    pub(crate) adoptions: usize,
    pub(crate) salvaged_bytes: usize,
}

/// Owner of the pool region and of everything obtained from the system.
pub(crate) struct ChunkSupplier<S>
where
    S: SystemAlloc,
{
    region: PoolRegion,
    regions: SystemRegions,
    heap_size: usize,
    counters: SupplierCounters,
    system: S,
}

impl<S> ChunkSupplier<S>
where
    S: SystemAlloc,
{
    pub(crate) const fn new(system: S) -> Self {
        Self {
            region: PoolRegion::new(),
            regions: SystemRegions::new(),
            heap_size: 0,
            counters: SupplierCounters {
                refills: 0,
                system_grows: 0,
                adoptions: 0,
                salvaged_bytes: 0,
            },
            system,
        }
    }

    pub(crate) fn system(&self) -> &S {
        &self.system
    }

    pub(crate) fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Total bytes ever requested from the system for pool growth.
    pub(crate) fn heap_size(&self) -> usize {
        self.heap_size
    }

    pub(crate) fn region_remaining(&self) -> usize {
        self.region.remaining()
    }

    pub(crate) fn region_count(&self) -> usize {
        self.regions.count()
    }

    pub(crate) fn counters(&self) -> SupplierCounters {
        self.counters
    }

    /// Carves up to `blocks` blocks of `class`, returns the first one and
    /// pushes the rest onto the list of `class`.
    pub(crate) fn refill(
        &mut self,
        lists: &mut FreeListTable,
        class: SizeClass,
        blocks: usize,
        max_chunk_bytes: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let (chunk, count) = self.chunk_alloc(lists, class, blocks, max_chunk_bytes)?;
        self.counters.refills += 1;
        tracing::trace!(
            class = class.index(),
            block_size = class.block_size(),
            blocks = count,
            "refilled free list"
        );
        if count > 1 {
            unsafe {
                let rest = chunk.add(class.block_size());
                lists.push_chain(class, rest, count - 1);
            }
        }
        Ok(chunk)
    }

    /// Carves a contiguous run of up to `blocks` blocks of `class`.
    ///
    /// Returns the start of the run and the number of blocks it holds,
    /// which is at least one.
    pub(crate) fn chunk_alloc(
        &mut self,
        lists: &mut FreeListTable,
        class: SizeClass,
        blocks: usize,
        max_chunk_bytes: usize,
    ) -> Result<(NonNull<u8>, usize), AllocError> {
        debug_assert!(blocks > 0);
        let block_size = class.block_size();
        // An overflowing request is treated like a refused system allocation.
        let growth_request = |heap_size: usize| {
            block_size
                .checked_mul(blocks)
                .and_then(|need| growth_size(need, heap_size, max_chunk_bytes))
        };

        for _ in 0..REFILL_ATTEMPTS {
            let remaining = self.region.remaining();
            if remaining >= block_size {
                let count = blocks.min(remaining / block_size);
                if let Some(chunk) = self.region.bump(count * block_size) {
                    return Ok((chunk, count));
                }
            }

            self.salvage_rest(lists);

            let bytes_to_get = growth_request(self.heap_size);
            let grown = bytes_to_get.and_then(|bytes| {
                let start = self.regions.acquire(&mut self.system, bytes)?;
                Some((start, bytes))
            });
            if let Some((start, bytes_to_get)) = grown {
                unsafe {
                    self.region.install(start, bytes_to_get);
                }
                self.heap_size = self.heap_size.saturating_add(bytes_to_get);
                self.counters.system_grows += 1;
                tracing::debug!(
                    bytes = bytes_to_get,
                    heap_size = self.heap_size,
                    "grew pool region"
                );
                continue;
            }

            if let Some((donor, block)) = Self::take_donor(lists, class) {
                unsafe {
                    self.region.install(block, donor.block_size());
                }
                self.counters.adoptions += 1;
                tracing::warn!(
                    requested = bytes_to_get,
                    donor = donor.block_size(),
                    block_size,
                    "system allocator exhausted, adopting free block as pool region"
                );
                continue;
            }

            tracing::error!(block_size, blocks, "pool exhausted");
            return OutOfMemorySnafu { size: block_size }.fail();
        }

        OutOfMemorySnafu { size: block_size }.fail()
    }

    /// Pops a free block of `class` or the smallest larger class that has
    /// one.
    fn take_donor(
        lists: &mut FreeListTable,
        class: SizeClass,
    ) -> Option<(SizeClass, NonNull<u8>)> {
        let donor = lists.first_stocked_from(class)?;
        let block = lists.pop(donor)?;
        Some((donor, block))
    }

    /// Pushes the unused tail of the region onto the free lists.
    ///
    /// The tail is split greedily into the largest classes that fit, so no
    /// byte is lost and no list receives an undersized block.
    fn salvage_rest(&mut self, lists: &mut FreeListTable) {
        let Some((mut start, mut len)) = self.region.take_rest() else {
            return;
        };
        tracing::debug!(bytes = len, "salvaging pool region tail");
        self.counters.salvaged_bytes += len;
        while let Some(class) = SizeClass::largest_fitting(len) {
            unsafe {
                lists.push(class, start);
                start = start.add(class.block_size());
            }
            len -= class.block_size();
        }
        debug_assert_eq!(len, 0, "pool region tail is not a multiple of 8");
    }
}

impl<S> Drop for ChunkSupplier<S>
where
    S: SystemAlloc,
{
    fn drop(&mut self) {
        self.region = PoolRegion::new();
        unsafe {
            self.regions.release_all(&mut self.system);
        }
    }
}
