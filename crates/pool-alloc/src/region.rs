//! Bump-allocated pool regions.
//!
//! The pool carves blocks from the front of a single contiguous region. The
//! region is never extended or shrunk from the back: once it cannot satisfy a
//! request it is replaced wholesale.
//!
//! Every region requested from the system is prefixed with a [`RegionHeader`]
//! so that all of them can be handed back when the pool is dropped:
//!
//! ```text
//! ┌──────────────────────┬────────────────────────────────────────┐
//! │ RegionHeader (16 B)  │ pool span (bytes_to_get)               │
//! │ ┌──────┬───────────┐ │ ┌──────────┬───────────────────────────┤
//! │ │ next │ total_len │ │ │ consumed │ start ──────────────► end │
//! │ └──────┴───────────┘ │ └──────────┴───────────────────────────┤
//! └──────────────────────┴────────────────────────────────────────┘
//! ```

use core::{alloc::Layout, ptr::NonNull};

use crate::system::{LARGE_ALIGN, SystemAlloc, system_layout};

/// The region blocks are currently carved from.
#[derive(Debug)]
pub(crate) struct PoolRegion {
    start: *mut u8,
    end: *mut u8,
}

impl PoolRegion {
    pub(crate) const fn new() -> Self {
        Self {
            start: core::ptr::null_mut(),
            end: core::ptr::null_mut(),
        }
    }

    /// Returns the number of bytes left in the region.
    pub(crate) fn remaining(&self) -> usize {
        self.end.addr() - self.start.addr()
    }

    /// Carves `size` bytes from the front of the region.
    ///
    /// Returns `None` without touching the region if fewer than `size` bytes
    /// remain.
    pub(crate) fn bump(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 || self.remaining() < size {
            return None;
        }
        let block = NonNull::new(self.start)?;
        // SAFETY: `start + size <= end`, both inside the installed span.
        self.start = unsafe { self.start.add(size) };
        Some(block)
    }

    /// Empties the region, returning its unused tail if there is one.
    pub(crate) fn take_rest(&mut self) -> Option<(NonNull<u8>, usize)> {
        let len = self.remaining();
        if len == 0 {
            return None;
        }
        let rest = NonNull::new(self.start)?;
        self.start = self.end;
        Some((rest, len))
    }

    /// Replaces the region with `start..start + len`.
    ///
    /// # Safety
    ///
    /// The span must be valid for reads and writes, exclusively owned by the
    /// pool, and must stay valid for as long as blocks are carved from it.
    pub(crate) unsafe fn install(&mut self, start: NonNull<u8>, len: usize) {
        debug_assert_eq!(self.remaining(), 0, "live region replaced before salvage");
        self.start = start.as_ptr();
        self.end = unsafe { self.start.add(len) };
    }
}

/// Header written at the base of every region obtained from the system.
#[repr(C, align(16))]
struct RegionHeader {
    next: Option<NonNull<RegionHeader>>,
    total_len: usize,
}

/// Bytes reserved in front of each system region for its header.
pub const REGION_HEADER_SIZE: usize = size_of::<RegionHeader>();

const _: () = assert!(REGION_HEADER_SIZE == LARGE_ALIGN);

/// Intrusive list of every region obtained from the system.
#[derive(Debug)]
pub(crate) struct SystemRegions {
    head: Option<NonNull<RegionHeader>>,
    count: usize,
}

impl SystemRegions {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            count: 0,
        }
    }

    /// Returns how many regions are currently held.
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Requests a region with `len` usable bytes from `system`.
    ///
    /// Returns the start of the usable span, aligned to `LARGE_ALIGN`, or
    /// `None` if the system allocator is exhausted.
    pub(crate) fn acquire<S>(&mut self, system: &mut S, len: usize) -> Option<NonNull<u8>>
    where
        S: SystemAlloc + ?Sized,
    {
        let total_len = len.checked_add(REGION_HEADER_SIZE)?;
        let layout = system_layout(total_len)?;
        let base = system.allocate(layout)?;
        let header = base.cast::<RegionHeader>();
        unsafe {
            header.write(RegionHeader {
                next: self.head,
                total_len,
            });
        }
        self.head = Some(header);
        self.count += 1;
        Some(unsafe { base.add(REGION_HEADER_SIZE) })
    }

    /// Returns every held region to `system`.
    ///
    /// # Safety
    ///
    /// No block carved from any held region may be used afterwards, and
    /// `system` must be the allocator the regions were acquired from.
    pub(crate) unsafe fn release_all<S>(&mut self, system: &mut S)
    where
        S: SystemAlloc + ?Sized,
    {
        while let Some(header) = self.head {
            unsafe {
                let RegionHeader { next, total_len } = header.read();
                self.head = next;
                let layout = Layout::from_size_align_unchecked(total_len, LARGE_ALIGN);
                system.deallocate(header.cast(), layout);
            }
        }
        self.count = 0;
    }
}
