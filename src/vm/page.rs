//! Page Descriptors
//!
//! One descriptor exists per tracked virtual page of a process, whether or
//! not that page currently has a physical frame. The backing variant decides
//! how the page is populated on first touch and what happens to it at
//! teardown:
//!
//! - `Binary`: a segment page of the process image, lazily read from the
//!   executable file
//! - `File`: a page of a memory-mapped file, written back when dirty at unmap
//! - `Anonymous`: zero-filled memory (stack, heap); the swap slot is reserved
//!   for an eviction path that is not implemented

use crate::fs::FileRef;
use crate::vm::PAGE_SIZE;

/// Mapping identifier, scoped to one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MappingId(pub u64);

impl MappingId {
    pub const NULL: Self = Self(0);
}

/// How to populate one page from its backing file
///
/// Loading reads `read_bytes` bytes at `offset` and zero-fills the remaining
/// `zero_bytes`; the two always sum to the page size.
#[derive(Debug, Clone, Copy)]
pub struct FileGeometry {
    /// Byte offset of this page's data in the backing file
    pub offset: u64,
    /// Bytes to read from the file
    pub read_bytes: usize,
    /// Bytes to zero-fill after the read
    pub zero_bytes: usize,
}

impl FileGeometry {
    /// Geometry for a page holding `remaining` more bytes of file data
    pub fn for_tail(offset: u64, remaining: u64) -> Self {
        let read_bytes = PAGE_SIZE.min(remaining as usize);
        Self {
            offset,
            read_bytes,
            zero_bytes: PAGE_SIZE - read_bytes,
        }
    }
}

/// Backing store variant of a page
pub enum PageBacking {
    /// Segment of the process's executable image
    Binary {
        file: FileRef,
        geometry: FileGeometry,
    },
    /// Page of a memory-mapped file, owned by a live mapping
    File {
        file: FileRef,
        geometry: FileGeometry,
        mapping: MappingId,
    },
    /// Zero-filled memory; `swap_slot` is reserved for eviction
    Anonymous { swap_slot: Option<usize> },
}

/// Record for one tracked virtual page
pub struct PageDescriptor {
    /// Page-aligned virtual address; the supplemental page table key
    pub vaddr: usize,
    /// Whether user stores through this page are legal
    pub writable: bool,
    /// Whether a frame is currently installed at `vaddr`
    ///
    /// Must agree with the page directory at all times.
    pub resident: bool,
    /// Backing store for population and teardown
    pub backing: PageBacking,
}

impl PageDescriptor {
    /// Descriptor for a zero-filled page
    pub fn anonymous(vaddr: usize, writable: bool) -> Self {
        Self {
            vaddr,
            writable,
            resident: false,
            backing: PageBacking::Anonymous { swap_slot: None },
        }
    }

    /// Descriptor for a lazily loaded executable-segment page
    pub fn binary(vaddr: usize, writable: bool, file: FileRef, geometry: FileGeometry) -> Self {
        Self {
            vaddr,
            writable,
            resident: false,
            backing: PageBacking::Binary { file, geometry },
        }
    }

    /// Descriptor for one page of a memory-mapped file
    pub fn file_backed(
        vaddr: usize,
        writable: bool,
        file: FileRef,
        geometry: FileGeometry,
        mapping: MappingId,
    ) -> Self {
        Self {
            vaddr,
            writable,
            resident: false,
            backing: PageBacking::File {
                file,
                geometry,
                mapping,
            },
        }
    }

    /// The backing file and geometry, for variants that have one
    pub fn file_backing(&self) -> Option<(&FileRef, &FileGeometry)> {
        match &self.backing {
            PageBacking::Binary { file, geometry } | PageBacking::File { file, geometry, .. } => {
                Some((file, geometry))
            }
            PageBacking::Anonymous { .. } => None,
        }
    }

    /// The owning mapping id, for `File`-backed pages
    pub fn mapping_id(&self) -> Option<MappingId> {
        match self.backing {
            PageBacking::File { mapping, .. } => Some(mapping),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
