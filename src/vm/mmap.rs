//! Memory-Mapped Files
//!
//! A mapping ties an independently reopened file handle to a contiguous run
//! of file-backed page descriptors. Creation is atomic: the whole run
//! registers or the attempt rolls back without residue. Teardown walks the
//! run in order, writes dirty pages back at their recorded offsets, and
//! releases the descriptors, frames, and the mapping's handle.

use alloc::vec::Vec;
use log::{debug, warn};

use crate::frame::FrameAllocator;
use crate::fs::{File, FileRef};
use crate::pagedir::PageDir;
use crate::vm::page::{FileGeometry, MappingId, PageDescriptor};
use crate::vm::spt::SupplementalPageTable;
use crate::vm::{is_page_aligned, is_user_vaddr, PAGE_SIZE};

/// Mapping-creation failure
///
/// All of these are reported to the caller rather than terminating it:
/// probing addresses with map requests is legitimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Address is null, not page-aligned, or the run leaves the user range
    BadAddress,
    /// The file has no bytes to map
    EmptyFile,
    /// A page of the requested run is already declared
    Collision,
    /// The file could not be reopened for the mapping
    ReopenFailed,
}

/// One live memory mapping
pub struct Mapping {
    /// Process-scoped identifier
    pub id: MappingId,
    /// The mapping's own file handle, independent of the caller's descriptor
    file: FileRef,
    /// Page-aligned addresses of the run, in file order
    ///
    /// Non-owning cross-reference: the supplemental page table owns the
    /// descriptors themselves.
    pages: Vec<usize>,
}

impl Mapping {
    /// Number of pages in the run
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Per-process table of live mappings
pub struct MmapTable {
    mappings: Vec<Mapping>,
    next_id: u64,
}

impl MmapTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            mappings: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of live mappings
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether no mappings are live
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Look up a live mapping by id
    pub fn get(&self, id: MappingId) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    /// Map `file` at `addr`, registering one descriptor per file page
    ///
    /// The handle is reopened so the mapping survives the caller closing its
    /// descriptor. Any page collision rolls the whole attempt back: pages
    /// registered before the collision are removed again and the reopened
    /// handle is dropped.
    pub fn map(
        &mut self,
        file: &dyn File,
        addr: usize,
        spt: &mut SupplementalPageTable,
    ) -> Result<MappingId, MapError> {
        if addr == 0 || !is_page_aligned(addr) {
            return Err(MapError::BadAddress);
        }
        let length = file.length();
        if length == 0 {
            return Err(MapError::EmptyFile);
        }
        // The entire run must land where the validator will let stores reach.
        let page_count = (length as usize).div_ceil(PAGE_SIZE);
        let span = (page_count - 1) * PAGE_SIZE;
        if !is_user_vaddr(addr) || !addr.checked_add(span).is_some_and(is_user_vaddr) {
            return Err(MapError::BadAddress);
        }
        let handle = file.reopen().map_err(|_| MapError::ReopenFailed)?;

        let id = MappingId(self.next_id);
        let mut pages: Vec<usize> = Vec::with_capacity(page_count);

        for i in 0..page_count {
            let vaddr = addr + i * PAGE_SIZE;
            let offset = (i * PAGE_SIZE) as u64;
            let geometry = FileGeometry::for_tail(offset, length - offset);
            let descriptor = PageDescriptor::file_backed(
                vaddr,
                true,
                FileRef::clone(&handle),
                geometry,
                id,
            );
            if spt.insert(descriptor).is_err() {
                for &registered in &pages {
                    // Registered by this attempt, so removal cannot miss.
                    let _ = spt.remove(registered);
                }
                return Err(MapError::Collision);
            }
            pages.push(vaddr);
        }

        self.next_id += 1;
        self.mappings.push(Mapping {
            id,
            file: handle,
            pages,
        });
        debug!("mmap: id {} covers {page_count} pages at {addr:#x}", id.0);
        Ok(id)
    }

    /// Tear down the mapping with `id`
    ///
    /// Unknown ids are a silent no-op so cleanup paths can call this for
    /// mappings already gone. Dirty resident pages are written back at their
    /// recorded offsets before their descriptors and frames are released.
    pub fn unmap(
        &mut self,
        id: MappingId,
        spt: &mut SupplementalPageTable,
        pagedir: &mut PageDir,
        frames: &dyn FrameAllocator,
    ) {
        let Some(index) = self.mappings.iter().position(|m| m.id == id) else {
            return;
        };
        let mapping = self.mappings.remove(index);

        for &vaddr in &mapping.pages {
            let Ok(descriptor) = spt.remove(vaddr) else {
                continue;
            };
            if !descriptor.resident {
                continue;
            }
            if pagedir.is_dirty(vaddr) {
                flush_page(&mapping.file, &descriptor, pagedir);
            }
            if let Some(frame) = pagedir.unmap(vaddr) {
                frames.release(frame);
            }
        }
        debug!("munmap: id {} released", id.0);
        // The mapping record and its file handle drop here.
    }

    /// Tear down every live mapping; the process-exit sweep
    pub fn unmap_all(
        &mut self,
        spt: &mut SupplementalPageTable,
        pagedir: &mut PageDir,
        frames: &dyn FrameAllocator,
    ) {
        while let Some(mapping) = self.mappings.last() {
            let id = mapping.id;
            self.unmap(id, spt, pagedir, frames);
        }
    }
}

impl Default for MmapTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one dirty page back through the mapping's handle
fn flush_page(file: &FileRef, descriptor: &PageDescriptor, pagedir: &PageDir) {
    let Some((_, geometry)) = descriptor.file_backing() else {
        return;
    };
    let Some(frame) = pagedir.lookup(descriptor.vaddr) else {
        return;
    };
    let written = frame.with_bytes(|bytes| {
        file.write_at(&bytes[..geometry.read_bytes], geometry.offset)
    });
    match written {
        Ok(n) if n == geometry.read_bytes => {}
        Ok(n) => warn!(
            "munmap: short write-back at {:#x} ({n}/{} bytes)",
            descriptor.vaddr, geometry.read_bytes
        ),
        Err(_) => warn!("munmap: write-back failed at {:#x}", descriptor.vaddr),
    }
}

// ============================================================================
// Tests
// ============================================================================
