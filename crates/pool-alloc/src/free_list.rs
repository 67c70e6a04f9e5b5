//! Per-class free lists.
//!
//! Each size class owns a singly linked LIFO chain of free blocks. While a
//! block sits on a list, its first machine word holds the pointer to the next
//! free block of the same class; the rest of the block is left untouched.
//!
//! ```text
//! heads[class] ──► ┌──────┬─────────┐    ┌──────┬─────────┐
//!                  │ next │ (stale) │ ─► │ None │ (stale) │
//!                  └──────┴─────────┘    └──────┴─────────┘
//! ```
//!
//! The table never interprets block contents beyond that first word, so
//! blocks are handled as raw byte spans rather than typed objects.

use core::ptr::NonNull;

use crate::size_class::{BLOCK_ALIGN, CLASS_COUNT, SizeClass};

/// Link word stored at the start of every free block.
#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

const _: () = assert!(size_of::<FreeBlock>() <= BLOCK_ALIGN);
const _: () = assert!(align_of::<FreeBlock>() <= BLOCK_ALIGN);

impl FreeBlock {
    /// Writes a link word into `block` and returns it as a node.
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of at least `BLOCK_ALIGN` bytes and
    /// aligned to `BLOCK_ALIGN`.
    unsafe fn init(block: NonNull<u8>, next: Option<NonNull<Self>>) -> NonNull<Self> {
        let node = block.cast::<Self>();
        debug_assert!(node.is_aligned(), "free block must be properly aligned");
        unsafe {
            node.write(Self { next });
        }
        node
    }
}

/// Heads of the free lists, one per size class.
pub(crate) struct FreeListTable {
    heads: [Option<NonNull<FreeBlock>>; CLASS_COUNT],
}

impl FreeListTable {
    pub(crate) const fn new() -> Self {
        Self {
            heads: [None; CLASS_COUNT],
        }
    }

    /// Removes and returns the head block of `class`, if any.
    pub(crate) fn pop(&mut self, class: SizeClass) -> Option<NonNull<u8>> {
        let head = self.heads[class.index()]?;
        // SAFETY: every node on a list was written by `FreeBlock::init` and
        // is owned by this table until popped.
        self.heads[class.index()] = unsafe { head.as_ref().next };
        Some(head.cast())
    }

    /// Pushes `block` onto the list of `class`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `block` is valid for reads and writes of `class.block_size()` bytes
    /// - `block` is aligned to `BLOCK_ALIGN`
    /// - `block` is not on any free list and is not in use
    pub(crate) unsafe fn push(&mut self, class: SizeClass, block: NonNull<u8>) {
        let head = &mut self.heads[class.index()];
        debug_assert!(
            *head != Some(block.cast()),
            "block pushed twice onto the same free list"
        );
        *head = Some(unsafe { FreeBlock::init(block, *head) });
    }

    /// Links `count` contiguous blocks starting at `start` and splices the
    /// resulting chain in front of the list of `class`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the span `start..start + count *
    /// class.block_size()` is valid, `BLOCK_ALIGN`-aligned, exclusively owned
    /// and not on any free list.
    pub(crate) unsafe fn push_chain(&mut self, class: SizeClass, start: NonNull<u8>, count: usize) {
        if count == 0 {
            return;
        }
        let block_size = class.block_size();
        let head = &mut self.heads[class.index()];
        unsafe {
            let mut next = *head;
            for i in (0..count).rev() {
                let block = start.add(i * block_size);
                next = Some(FreeBlock::init(block, next));
            }
            *head = next;
        }
    }

    /// Returns `true` if `class` has no free blocks.
    pub(crate) fn is_empty(&self, class: SizeClass) -> bool {
        self.heads[class.index()].is_none()
    }

    /// Counts the free blocks of `class` by walking its list.
    pub(crate) fn len(&self, class: SizeClass) -> usize {
        let mut count = 0;
        let mut node = self.heads[class.index()];
        while let Some(current) = node {
            count += 1;
            node = unsafe { current.as_ref().next };
        }
        count
    }

    /// Returns the smallest class at least as large as `class` that has a
    /// free block.
    pub(crate) fn first_stocked_from(&self, class: SizeClass) -> Option<SizeClass> {
        class.and_larger().find(|&c| !self.is_empty(c))
    }
}
