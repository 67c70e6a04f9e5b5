//! Segmented free-list memory pool.
//!
//! This crate provides an allocator for small, fixed-size requests that
//! serves memory out of contiguous regions reserved from an underlying system
//! allocator, while forwarding large requests to that allocator directly. It
//! is `no_std` compatible and only needs `alloc` for the default
//! [`Global`] backend.
//!
//! # Design
//!
//! ## Size classes
//!
//! Requests of 1 to [`MAX_SMALL_BYTES`] bytes are rounded up to one of
//! [`CLASS_COUNT`] size classes, using 8-byte steps for small requests and
//! progressively coarser steps (up to 256 bytes) for larger ones. See
//! [`size_class`].
//!
//! ## Free lists
//!
//! Every class owns a LIFO free list. A free block's first word links to the
//! next free block of the same class, so bookkeeping costs no memory beyond
//! the blocks themselves. Allocation and deallocation are O(1) while a list
//! is stocked.
//!
//! ## Pool regions
//!
//! When a list runs dry it is refilled with
//! [`blocks_per_refill`](PoolConfig::blocks_per_refill) blocks carved from
//! the current pool region. An exhausted region is replaced by a new one
//! whose size grows with the total memory requested so far, capped at
//! [`max_chunk_bytes`](PoolConfig::max_chunk_bytes). Leftover region bytes
//! are recycled onto free lists, and if the system allocator refuses to grow
//! the pool, a free block of a larger class is adopted as the new region.
//!
//! Memory reserved for the pool is never merged, split across classes or
//! returned to the system until the [`PoolAllocator`] is dropped.
//!
//! # Usage
//!
//! ```rust
//! use pool_alloc::{PoolAllocator, PoolConfig};
//!
//! let mut pool = PoolAllocator::new();
//!
//! // Small requests are served from free lists.
//! let small = pool.allocate(200).unwrap();
//! assert_eq!(PoolAllocator::<pool_alloc::Global>::usable_size(200), 208);
//!
//! // Large requests go straight to the system allocator.
//! let large = pool.allocate(64 * 1024).unwrap();
//!
//! unsafe {
//!     pool.deallocate(small, 200);
//!     pool.deallocate(large, 64 * 1024);
//! }
//!
//! // The refill policy can be tuned.
//! let mut tuned = PoolAllocator::with_config(
//!     pool_alloc::Global,
//!     PoolConfig::new().with_blocks_per_refill(32),
//! );
//! let block = tuned.allocate(16).unwrap();
//! unsafe { tuned.deallocate(block, 16) };
//! ```
//!
//! # Safety
//!
//! Deallocation is `unsafe`: the caller must hand back each block exactly
//! once, with a size in the same class as the one it was allocated with.
//! This is not checked, and a violation corrupts a free list.
//!
//! # Thread Safety
//!
//! [`PoolAllocator`] is `Send` but not `Sync`. Use one pool per thread, or
//! [`LockedPool`] to share one behind a spin lock.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod chunk;
pub mod config;
pub mod error;
mod free_list;
pub mod locked;
pub mod pool;
mod region;
pub mod size_class;
pub mod system;
#[cfg(test)]
mod testing;

pub use self::{
    chunk::REFILL_ATTEMPTS,
    config::{DEFAULT_BLOCKS_PER_REFILL, MAX_CHUNK_BYTES, PoolConfig},
    error::{AllocError, Location},
    locked::LockedPool,
    pool::{ClassState, PoolAllocator, PoolStats},
    region::REGION_HEADER_SIZE,
    size_class::{BAND_ALIGNS, BLOCK_ALIGN, CLASS_COUNT, MAX_SMALL_BYTES, SizeClass},
    system::{Global, LARGE_ALIGN, SystemAlloc},
};
