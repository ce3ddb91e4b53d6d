//! Allocation accounting.
//!
//! [`CountingAllocator`] forwards to the system allocator and keeps a running
//! total of bytes requested. Install it in a binary with
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: query_bench::alloc::CountingAllocator = query_bench::alloc::CountingAllocator;
//! ```
//!
//! Without it every [`AllocationMeter`] reads zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct CountingAllocator;

impl CountingAllocator {
    #[inline]
    fn record(size: usize) {
        ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
        INSTALLED.store(true, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        Self::record(layout.size());
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        Self::record(layout.size());
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        Self::record(new_size);
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

/// Total bytes allocated process-wide since start-up. Frees are not subtracted.
pub fn allocated_bytes() -> u64 {
    ALLOCATED.load(Ordering::Relaxed)
}

/// Whether [`CountingAllocator`] is the global allocator.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Relaxed)
}

/// Bytes allocated between [`AllocationMeter::start`] and
/// [`AllocationMeter::allocated`], across all threads.
#[derive(Debug, Clone, Copy)]
pub struct AllocationMeter {
    start: u64,
}

impl AllocationMeter {
    pub fn start() -> Self {
        Self {
            start: allocated_bytes(),
        }
    }

    pub fn allocated(&self) -> u64 {
        allocated_bytes().saturating_sub(self.start)
    }
}
