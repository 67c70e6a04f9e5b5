//! Tunables of the refill policy.

use crate::size_class::MAX_SMALL_BYTES;

/// Number of blocks a refill tries to carve at once.
pub const DEFAULT_BLOCKS_PER_REFILL: usize = 10;

/// Cap on a single pool-growth request (1 MiB).
///
/// A request whose own need exceeds the cap is still served in full.
pub const MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// Refill policy of a [`PoolAllocator`](crate::PoolAllocator).
///
/// # Examples
///
/// ```
/// use pool_alloc::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_blocks_per_refill(32)
///     .with_max_chunk_bytes(256 * 1024);
/// assert_eq!(config.blocks_per_refill(), 32);
/// assert_eq!(config.max_chunk_bytes(), 256 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    blocks_per_refill: usize,
    max_chunk_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Creates the default policy: 10 blocks per refill, 1 MiB growth cap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks_per_refill: DEFAULT_BLOCKS_PER_REFILL,
            max_chunk_bytes: MAX_CHUNK_BYTES,
        }
    }

    /// Sets how many blocks a refill tries to carve at once.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is zero.
    #[must_use]
    pub const fn with_blocks_per_refill(mut self, blocks: usize) -> Self {
        assert!(blocks > 0, "a refill must carve at least one block");
        self.blocks_per_refill = blocks;
        self
    }

    /// Sets the cap on a single pool-growth request.
    ///
    /// The cap is applied rounded down to a multiple of
    /// [`BLOCK_ALIGN`](crate::BLOCK_ALIGN).
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is smaller than the largest block size.
    #[must_use]
    pub const fn with_max_chunk_bytes(mut self, bytes: usize) -> Self {
        assert!(
            bytes >= MAX_SMALL_BYTES,
            "growth cap must hold at least one block of every class"
        );
        self.max_chunk_bytes = bytes;
        self
    }

    /// Returns how many blocks a refill tries to carve at once.
    #[must_use]
    pub const fn blocks_per_refill(&self) -> usize {
        self.blocks_per_refill
    }

    /// Returns the cap on a single pool-growth request, as configured.
    #[must_use]
    pub const fn max_chunk_bytes(&self) -> usize {
        self.max_chunk_bytes
    }
}
