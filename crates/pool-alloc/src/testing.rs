use core::{alloc::Layout, ptr::NonNull};

use crate::system::SystemAlloc;

/// System allocator double that records every request and can be told to
/// fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingSystem {
    requests: Vec<Layout>,
    live: Vec<(NonNull<u8>, Layout)>,
    failing: bool,
}

impl RecordingSystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Sizes of all successful requests, in order.
    pub(crate) fn request_sizes(&self) -> Vec<usize> {
        self.requests.iter().map(Layout::size).collect()
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.live.len()
    }
}

// SAFETY: the recorded pointers are owned exclusively by the double.
unsafe impl Send for RecordingSystem {}

unsafe impl SystemAlloc for RecordingSystem {
    fn allocate(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        if self.failing {
            return None;
        }
        let ptr = NonNull::new(unsafe { std::alloc::alloc(layout) })?;
        unsafe {
            ptr.write_bytes(0x11, layout.size());
        }
        self.requests.push(layout);
        self.live.push((ptr, layout));
        Some(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let index = self
            .live
            .iter()
            .position(|&(p, _)| p == ptr)
            .expect("deallocating memory not owned by the system double");
        let (_, live_layout) = self.live.swap_remove(index);
        assert_eq!(live_layout, layout, "deallocated with a different layout");
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

impl Drop for RecordingSystem {
    fn drop(&mut self) {
        for (ptr, layout) in self.live.drain(..) {
            unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}
