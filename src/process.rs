//! Process State
//!
//! The per-process record the VM core and syscall layer operate on: the
//! supplemental page table, the page directory, the open-file table, the
//! mapping table, and the executable image handle. One kernel thread runs
//! per process, so the record is handed around as `&mut` without internal
//! locking.

use heapless::String;
use log::info;

use crate::frame::FrameAllocator;
use crate::fs::{File, FileRef};
use crate::types::{Fd, Pid};
use crate::vm::page::{FileGeometry, PageDescriptor};
use crate::vm::spt::SptError;
use crate::vm::{is_page_aligned, MmapTable, SupplementalPageTable, PAGE_SIZE};
use crate::pagedir::PageDir;

/// Open-file table capacity, including the two console slots
pub const MAX_FD: usize = 64;

/// Console input descriptor
pub const FD_STDIN: Fd = 0;

/// Console output descriptor
pub const FD_STDOUT: Fd = 1;

/// One open-file table slot
///
/// The seek position lives here, not in the file handle, so independently
/// opened descriptors of one file seek independently.
pub struct OpenFile {
    pub file: FileRef,
    pub pos: u64,
    /// Set when this handle write-denied its file; closing re-allows
    pub denies_write: bool,
}

/// Fixed-capacity open-file table
///
/// Slots 0 and 1 are reserved for the console and never hold files.
pub struct FdTable {
    slots: [Option<OpenFile>; MAX_FD],
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Place `file` in the lowest free slot, returning its descriptor
    pub fn install(&mut self, file: FileRef) -> Option<Fd> {
        for fd in 2..MAX_FD {
            if self.slots[fd].is_none() {
                self.slots[fd] = Some(OpenFile {
                    file,
                    pos: 0,
                    denies_write: false,
                });
                return Some(fd);
            }
        }
        None
    }

    /// The open file at `fd`, if the slot is in range and occupied
    pub fn get(&self, fd: Fd) -> Option<&OpenFile> {
        self.slots.get(fd)?.as_ref()
    }

    /// Mutable variant of [`get`](Self::get)
    pub fn get_mut(&mut self, fd: Fd) -> Option<&mut OpenFile> {
        self.slots.get_mut(fd)?.as_mut()
    }

    /// Vacate `fd`, returning the open file it held
    ///
    /// A write-deny the handle placed is lifted before it is handed back.
    pub fn close(&mut self, fd: Fd) -> Option<OpenFile> {
        let mut open = self.slots.get_mut(fd)?.take()?;
        if open.denies_write {
            open.file.allow_write();
            open.denies_write = false;
        }
        Some(open)
    }

    /// Drop every open file, lifting any write-denies the handles placed
    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            if let Some(open) = slot.take() {
                if open.denies_write {
                    open.file.allow_write();
                }
            }
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-process kernel state
pub struct Process {
    /// Process identifier
    pub pid: Pid,
    /// Short name, as shown in the exit line
    pub name: String<16>,
    /// Supplemental page table; sole owner of this process's descriptors
    pub spt: SupplementalPageTable,
    /// Hardware page-table state
    pub pagedir: PageDir,
    /// Open-file table
    pub fds: FdTable,
    /// Live memory mappings
    pub mmaps: MmapTable,
    /// The process's own image, write-denied while it runs
    executable: Option<FileRef>,
    /// Recorded exit status, set once at termination
    pub exit_status: Option<i32>,
}

impl Process {
    /// Create a process record with an empty address space
    pub fn new(name: &str) -> Self {
        let mut short = String::new();
        for c in name.chars().take(16) {
            if short.push(c).is_err() {
                break;
            }
        }
        Self {
            pid: Pid::new(),
            name: short,
            spt: SupplementalPageTable::new(),
            pagedir: PageDir::new(),
            fds: FdTable::new(),
            mmaps: MmapTable::new(),
            executable: None,
            exit_status: None,
        }
    }

    /// Record the process image and deny writes to it while the process runs
    pub fn set_executable(&mut self, file: FileRef) {
        file.deny_write();
        self.executable = Some(file);
    }

    /// Name of the image backing this process, if recorded
    pub fn executable(&self) -> Option<&FileRef> {
        self.executable.as_ref()
    }

    /// Declare one loadable segment of the process image
    ///
    /// Registers a lazily loaded descriptor per page: `read_bytes` file bytes
    /// starting at `offset`, then `zero_bytes` of zero fill. Pages holding no
    /// file bytes at all become plain anonymous pages.
    pub fn declare_segment(
        &mut self,
        file: &FileRef,
        offset: u64,
        vaddr: usize,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<(), SptError> {
        debug_assert!(is_page_aligned(vaddr));
        debug_assert!((read_bytes + zero_bytes) % PAGE_SIZE == 0);

        let mut read_left = read_bytes;
        let mut zero_left = zero_bytes;
        let mut va = vaddr;
        let mut ofs = offset;
        while read_left + zero_left > 0 {
            let page_read = read_left.min(PAGE_SIZE);
            let page_zero = PAGE_SIZE - page_read;
            let descriptor = if page_read == 0 {
                PageDescriptor::anonymous(va, writable)
            } else {
                PageDescriptor::binary(
                    va,
                    writable,
                    FileRef::clone(file),
                    FileGeometry {
                        offset: ofs,
                        read_bytes: page_read,
                        zero_bytes: page_zero,
                    },
                )
            };
            self.spt.insert(descriptor)?;
            read_left -= page_read;
            zero_left -= page_zero;
            va += PAGE_SIZE;
            ofs += page_read as u64;
        }
        Ok(())
    }

    /// Declare `pages` anonymous stack pages ending at `top`
    pub fn declare_stack(&mut self, top: usize, pages: usize) -> Result<(), SptError> {
        debug_assert!(is_page_aligned(top));
        for i in 1..=pages {
            self.spt
                .insert(PageDescriptor::anonymous(top - i * PAGE_SIZE, true))?;
        }
        Ok(())
    }

    /// Tear the process down and record `status`
    ///
    /// Order matters: mappings flush dirty pages while their descriptors and
    /// frames are still live, then the supplemental page table reclaims every
    /// remaining frame, then file handles close. Safe to call once; repeat
    /// calls keep the first status.
    pub fn terminate(&mut self, status: i32, frames: &dyn FrameAllocator) {
        if self.exit_status.is_some() {
            return;
        }
        self.exit_status = Some(status);

        // Dirty-page write-back and handle drops touch the file subsystem.
        // Any guard a failing handler held was dropped before the boundary
        // called here, so taking the lock cannot self-deadlock.
        let _guard = crate::fs::filesys_lock();
        self.mmaps
            .unmap_all(&mut self.spt, &mut self.pagedir, frames);
        self.spt.destroy_all(&mut self.pagedir, frames);
        self.fds.close_all();
        if let Some(image) = self.executable.take() {
            image.allow_write();
        }
        info!("{}: exit({})", self.name.as_str(), status);
    }
}

// ============================================================================
// Tests
// ============================================================================
