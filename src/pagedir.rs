//! Page Directory - Hardware Page Table State
//!
//! Architecture-independent view of one process's hardware page table.
//! It tracks, per page-aligned virtual address, the installed frame, the
//! write permission, and the dirty/accessed bits the hardware would maintain.
//!
//! ## Key Operations
//!
//! - `map`: install a virtual-to-frame translation
//! - `unmap`: remove a translation, returning the frame for reclamation
//! - `lookup`: query the installed frame
//! - `is_dirty` / `set_dirty`: the write-back check used at unmap time
//!
//! The kernel-side user-memory path sets the dirty bit explicitly when it
//! writes through a translation, standing in for the MMU doing so on a user
//! store.

use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::frame::FrameRef;
use crate::vm::trunc_page;

/// One installed translation
struct Translation {
    frame: FrameRef,
    writable: bool,
    dirty: bool,
    accessed: bool,
}

/// Statistics for a page directory
#[derive(Debug, Default)]
pub struct PageDirStats {
    /// Number of installed translations
    pub resident_count: AtomicU32,
}

impl PageDirStats {
    pub fn resident(&self) -> u32 {
        self.resident_count.load(Ordering::Relaxed)
    }
}

/// Per-process page directory
pub struct PageDir {
    translations: BTreeMap<usize, Translation>,
    /// Statistics
    pub stats: PageDirStats,
}

impl PageDir {
    /// Create an empty page directory
    pub fn new() -> Self {
        Self {
            translations: BTreeMap::new(),
            stats: PageDirStats::default(),
        }
    }

    /// Install a translation from `vaddr`'s page to `frame`
    ///
    /// Returns false if a translation is already installed there.
    pub fn map(&mut self, vaddr: usize, frame: FrameRef, writable: bool) -> bool {
        let page = trunc_page(vaddr);
        if self.translations.contains_key(&page) {
            return false;
        }
        self.translations.insert(
            page,
            Translation {
                frame,
                writable,
                dirty: false,
                accessed: false,
            },
        );
        self.stats.resident_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove the translation at `vaddr`'s page, returning its frame
    pub fn unmap(&mut self, vaddr: usize) -> Option<FrameRef> {
        let removed = self.translations.remove(&trunc_page(vaddr))?;
        self.stats.resident_count.fetch_sub(1, Ordering::Relaxed);
        Some(removed.frame)
    }

    /// Frame installed at `vaddr`'s page, if any
    pub fn lookup(&self, vaddr: usize) -> Option<FrameRef> {
        self.translations
            .get(&trunc_page(vaddr))
            .map(|t| FrameRef::clone(&t.frame))
    }

    /// Whether the translation at `vaddr`'s page permits writes
    pub fn is_writable(&self, vaddr: usize) -> bool {
        self.translations
            .get(&trunc_page(vaddr))
            .map(|t| t.writable)
            .unwrap_or(false)
    }

    /// Whether the page at `vaddr` has been written since it was installed
    pub fn is_dirty(&self, vaddr: usize) -> bool {
        self.translations
            .get(&trunc_page(vaddr))
            .map(|t| t.dirty)
            .unwrap_or(false)
    }

    /// Record a write through the translation at `vaddr`'s page
    pub fn set_dirty(&mut self, vaddr: usize, dirty: bool) {
        if let Some(t) = self.translations.get_mut(&trunc_page(vaddr)) {
            t.dirty = dirty;
        }
    }

    /// Whether the page at `vaddr` has been touched since install
    pub fn is_accessed(&self, vaddr: usize) -> bool {
        self.translations
            .get(&trunc_page(vaddr))
            .map(|t| t.accessed)
            .unwrap_or(false)
    }

    /// Record an access through the translation at `vaddr`'s page
    pub fn set_accessed(&mut self, vaddr: usize, accessed: bool) {
        if let Some(t) = self.translations.get_mut(&trunc_page(vaddr)) {
            t.accessed = accessed;
        }
    }
}

impl Default for PageDir {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
