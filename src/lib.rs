//! Pintail VM - virtual memory core for the Pintail teaching kernel
//!
//! This crate holds the per-process demand-paging state and the machinery
//! built on it: supplemental page tables, lazy loading, memory-mapped files,
//! user-pointer validation, and the system-call layer that consumes them.
//! The scheduler, the disk file system, and the machine's physical memory
//! map live outside and are reached through the seams in `fs`, `frame`, and
//! `syscall`.

#![cfg_attr(not(test), no_std)]
// Kernel types have specialized initialization that doesn't fit Default
#![allow(clippy::new_without_default)]

// Standard library replacement for no_std
extern crate alloc;

// Core types
pub mod types;

// Collaborator seams
pub mod frame;
pub mod fs;
pub mod pagedir;

// Virtual memory subsystem
pub mod vm;

// Process state and syscall boundary
pub mod process;
pub mod syscall;

pub use frame::{Frame, FrameAllocator, FrameRef, PoolFrameAllocator};
pub use fs::{filesys_lock, File, FileRef, FileSystem, FsError, MemFile, MemFs};
pub use pagedir::PageDir;
pub use process::{FdTable, OpenFile, Process, FD_STDIN, FD_STDOUT, MAX_FD};
pub use syscall::{handle, Outcome, SyscallCtx, SyscallEnv, TrapFrame};
pub use types::{Fd, Pid};
pub use vm::{
    Exit, FaultError, FileGeometry, LoadError, MapError, Mapping, MappingId, MmapTable,
    PageBacking, PageDescriptor, SptError, SupplementalPageTable, UserResult, KERNEL_BASE,
    PAGE_SHIFT, PAGE_SIZE, USER_BASE,
};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Subsystem name
pub const NAME: &str = "pintail-vm";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(NAME, "pintail-vm");
        assert!(!VERSION.is_empty());
    }
}
