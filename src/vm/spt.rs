//! Supplemental Page Table
//!
//! The per-process associative set of page descriptors, keyed by page-aligned
//! virtual address. It is the sole owner of descriptors: removal hands the
//! descriptor back to the caller, teardown frees every frame still resident.
//!
//! The table is process-private state and carries no lock of its own; the
//! kernel runs one thread per address space, so no two threads mutate one
//! process's table. A multi-threaded-process extension would need to add a
//! lock here.

use hashbrown::HashMap;

use crate::frame::FrameAllocator;
use crate::pagedir::PageDir;
use crate::vm::page::PageDescriptor;
use crate::vm::trunc_page;

/// Supplemental page table failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SptError {
    /// A descriptor already exists at that address
    Duplicate,
    /// No descriptor exists at that address
    NotFound,
}

/// Per-process supplemental page table
pub struct SupplementalPageTable {
    pages: HashMap<usize, PageDescriptor>,
}

impl SupplementalPageTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    /// Number of tracked pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the table tracks no pages
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Take ownership of `descriptor`
    ///
    /// Fails, leaving the existing descriptor untouched, if one is already
    /// registered at the same page.
    pub fn insert(&mut self, descriptor: PageDescriptor) -> Result<(), SptError> {
        let key = trunc_page(descriptor.vaddr);
        if self.pages.contains_key(&key) {
            return Err(SptError::Duplicate);
        }
        self.pages.insert(key, descriptor);
        Ok(())
    }

    /// Remove the descriptor at `vaddr`'s page, returning ownership of it
    pub fn remove(&mut self, vaddr: usize) -> Result<PageDescriptor, SptError> {
        self.pages.remove(&trunc_page(vaddr)).ok_or(SptError::NotFound)
    }

    /// Descriptor covering `addr`, if that page has been declared
    ///
    /// A hit with `resident == false` is a valid state (declared, not yet
    /// populated), distinct from a miss.
    pub fn lookup(&self, addr: usize) -> Option<&PageDescriptor> {
        self.pages.get(&trunc_page(addr))
    }

    /// Mutable variant of [`lookup`](Self::lookup)
    pub fn lookup_mut(&mut self, addr: usize) -> Option<&mut PageDescriptor> {
        self.pages.get_mut(&trunc_page(addr))
    }

    /// Iterate over all descriptors in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.pages.values()
    }

    /// Free every descriptor, reclaiming resident frames first
    ///
    /// Process-teardown only: resident pages are unmapped from `pagedir` and
    /// their frames returned to `frames` before the descriptors are dropped.
    pub fn destroy_all(&mut self, pagedir: &mut PageDir, frames: &dyn FrameAllocator) {
        for (vaddr, descriptor) in self.pages.drain() {
            if descriptor.resident {
                if let Some(frame) = pagedir.unmap(vaddr) {
                    frames.release(frame);
                }
            }
        }
    }
}

impl Default for SupplementalPageTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
