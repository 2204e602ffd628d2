//! Physical Frame Allocation
//!
//! The VM core consumes physical memory through a narrow allocator seam.
//! A frame is one page of backing storage behind interior mutability; the
//! page directory holds a reference to it while it is mapped, and the
//! allocator reclaims it at unmap or process teardown.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

use crate::vm::PAGE_SIZE;

/// Shared handle to an allocated physical frame
pub type FrameRef = Arc<Frame>;

/// One physical page of memory
pub struct Frame {
    bytes: Mutex<[u8; PAGE_SIZE]>,
}

impl Frame {
    fn new() -> Self {
        Self {
            bytes: Mutex::new([0u8; PAGE_SIZE]),
        }
    }

    /// Run `f` with exclusive access to the frame's bytes
    pub fn with_bytes<R>(&self, f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> R) -> R {
        f(&mut self.bytes.lock())
    }
}

/// Allocator seam for physical frames
///
/// Takes `&self`: implementations guard their free state internally so the
/// allocator can be shared across the syscall and teardown paths.
pub trait FrameAllocator {
    /// Allocate a zeroed frame, or `None` when physical memory is exhausted
    fn allocate(&self) -> Option<FrameRef>;

    /// Return a frame to the allocator
    fn release(&self, frame: FrameRef);
}

// ============================================================================
// Pooled Allocator
// ============================================================================

/// Statistics for a frame pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Frames handed out and not yet released
    pub in_use: AtomicU64,
    /// Total allocations served
    pub allocations: AtomicU64,
}

/// Fixed-capacity frame allocator
///
/// Stands in for the machine's physical allocator: a capacity cap plus an
/// in-use count. Frames are plain heap pages here; a kernel binary maps the
/// seam onto its real physical memory instead.
pub struct PoolFrameAllocator {
    capacity: u64,
    stats: PoolStats,
}

impl PoolFrameAllocator {
    /// Create a pool that serves at most `capacity` concurrent frames
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Frames currently handed out
    pub fn in_use(&self) -> u64 {
        self.stats.in_use.load(Ordering::Relaxed)
    }

    /// Total allocations served over the pool's lifetime
    pub fn allocations(&self) -> u64 {
        self.stats.allocations.load(Ordering::Relaxed)
    }
}

impl FrameAllocator for PoolFrameAllocator {
    fn allocate(&self) -> Option<FrameRef> {
        // Reserve a slot first so concurrent callers cannot overshoot.
        let prev = self.stats.in_use.fetch_add(1, Ordering::AcqRel);
        if prev >= self.capacity {
            self.stats.in_use.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        Some(Arc::new(Frame::new()))
    }

    fn release(&self, frame: FrameRef) {
        drop(frame);
        self.stats.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Tests
// ============================================================================
