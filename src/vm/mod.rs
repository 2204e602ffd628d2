//! Pintail Virtual Memory Subsystem
//!
//! Per-process demand-paging state and the operations built on it:
//! - page: page descriptors (the per-page record and its backing variants)
//! - spt: supplemental page table (descriptor ownership, keyed by address)
//! - load: populating a frame from a descriptor's file geometry
//! - fault: the page-in path that makes a declared page resident
//! - mmap: memory-mapped files (atomic creation, dirty write-back teardown)
//! - validate: user-pointer checks ahead of any syscall dereference
//! - usermem: kernel-side copies across the user/kernel boundary

pub mod fault;
pub mod load;
pub mod mmap;
pub mod page;
pub mod spt;
pub mod usermem;
pub mod validate;

pub use fault::{page_in, FaultError};
pub use load::{load_page, LoadError};
pub use mmap::{MapError, Mapping, MmapTable};
pub use page::{FileGeometry, MappingId, PageBacking, PageDescriptor};
pub use spt::{SptError, SupplementalPageTable};
pub use validate::{validate_address, validate_buffer, validate_string, Exit, UserResult};

/// Page size (4KB on most platforms)
pub const PAGE_SIZE: usize = 4096;

/// Page shift (log2 of PAGE_SIZE)
pub const PAGE_SHIFT: usize = 12;

/// Lowest legal user virtual address
pub const USER_BASE: usize = 0x0804_8000;

/// First kernel virtual address; user addresses lie below it
pub const KERNEL_BASE: usize = 0xC000_0000;

/// Round an address down to its containing page boundary
pub const fn trunc_page(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Round an address up to the next page boundary
pub const fn round_page(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Whether an address is an exact multiple of the page size
pub const fn is_page_aligned(addr: usize) -> bool {
    addr & (PAGE_SIZE - 1) == 0
}

/// Whether an address lies in the legal user range
pub const fn is_user_vaddr(addr: usize) -> bool {
    addr >= USER_BASE && addr < KERNEL_BASE
}

// ============================================================================
// Tests
// ============================================================================
