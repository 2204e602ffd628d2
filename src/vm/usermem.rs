//! User-Memory Access
//!
//! Kernel-side copies across the privilege boundary. Each copy validates the
//! whole user range first, then moves bytes page by page through the
//! installed frames, paging declared-but-absent pages in on the way. A copy
//! that touches undeclared memory, or writes through a read-only page,
//! terminates the process exactly as the validator would.

use alloc::string::String;
use alloc::vec::Vec;

use crate::frame::FrameAllocator;
use crate::pagedir::PageDir;
use crate::vm::fault::page_in;
use crate::vm::spt::SupplementalPageTable;
use crate::vm::validate::{validate_address, validate_buffer, Exit, UserResult};
use crate::vm::{trunc_page, PAGE_SIZE};

/// Longest C string the kernel will copy in
pub const MAX_CSTR: usize = 4096;

fn resident_page(
    spt: &mut SupplementalPageTable,
    pagedir: &mut PageDir,
    frames: &dyn FrameAllocator,
    page: usize,
) -> UserResult<()> {
    // Population failure (I/O, exhausted frames) is fatal to the process;
    // the page contents cannot be trusted after it.
    page_in(spt, pagedir, frames, page).map_err(|_| Exit::BAD_ACCESS)
}

/// Copy `buf.len()` bytes from user address `src` into `buf`
pub fn copy_in(
    spt: &mut SupplementalPageTable,
    pagedir: &mut PageDir,
    frames: &dyn FrameAllocator,
    src: usize,
    buf: &mut [u8],
) -> UserResult<()> {
    validate_buffer(spt, src, buf.len(), false)?;
    let mut pos = 0;
    while pos < buf.len() {
        let addr = src + pos;
        let page = trunc_page(addr);
        let page_off = addr - page;
        let chunk = (PAGE_SIZE - page_off).min(buf.len() - pos);

        resident_page(spt, pagedir, frames, page)?;
        let frame = pagedir.lookup(page).ok_or(Exit::BAD_ACCESS)?;
        frame.with_bytes(|bytes| {
            buf[pos..pos + chunk].copy_from_slice(&bytes[page_off..page_off + chunk])
        });
        pagedir.set_accessed(page, true);
        pos += chunk;
    }
    Ok(())
}

/// Copy `buf` out to user address `dst`, marking touched pages dirty
pub fn copy_out(
    spt: &mut SupplementalPageTable,
    pagedir: &mut PageDir,
    frames: &dyn FrameAllocator,
    dst: usize,
    buf: &[u8],
) -> UserResult<()> {
    validate_buffer(spt, dst, buf.len(), true)?;
    let mut pos = 0;
    while pos < buf.len() {
        let addr = dst + pos;
        let page = trunc_page(addr);
        let page_off = addr - page;
        let chunk = (PAGE_SIZE - page_off).min(buf.len() - pos);

        resident_page(spt, pagedir, frames, page)?;
        let frame = pagedir.lookup(page).ok_or(Exit::BAD_ACCESS)?;
        frame.with_bytes(|bytes| {
            bytes[page_off..page_off + chunk].copy_from_slice(&buf[pos..pos + chunk])
        });
        // Stand-in for the MMU's store bookkeeping.
        pagedir.set_accessed(page, true);
        pagedir.set_dirty(page, true);
        pos += chunk;
    }
    Ok(())
}

/// Copy a NUL-terminated user string in, bounded by [`MAX_CSTR`]
///
/// Unlike the string pre-check, the copy itself walks every page it reads;
/// an unterminated or undeclared tail terminates the process.
pub fn copy_in_cstr(
    spt: &mut SupplementalPageTable,
    pagedir: &mut PageDir,
    frames: &dyn FrameAllocator,
    src: usize,
) -> UserResult<String> {
    let mut bytes: Vec<u8> = Vec::new();
    for i in 0..MAX_CSTR {
        let addr = src.wrapping_add(i);
        validate_address(spt, addr)?.ok_or(Exit::BAD_ACCESS)?;

        let page = trunc_page(addr);
        resident_page(spt, pagedir, frames, page)?;
        let frame = pagedir.lookup(page).ok_or(Exit::BAD_ACCESS)?;
        let byte = frame.with_bytes(|b| b[addr - page]);
        pagedir.set_accessed(page, true);
        if byte == 0 {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        bytes.push(byte);
    }
    Err(Exit::BAD_ACCESS)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PoolFrameAllocator;
    use crate::vm::page::PageDescriptor;

    const V: usize = 0x0804_8000;

    fn fixture(pages: usize, writable: bool) -> (SupplementalPageTable, PageDir, PoolFrameAllocator) {
        let mut spt = SupplementalPageTable::new();
        for i in 0..pages {
            spt.insert(PageDescriptor::anonymous(V + i * PAGE_SIZE, writable))
                .unwrap();
        }
        (spt, PageDir::new(), PoolFrameAllocator::new(8))
    }

    #[test]
    fn test_round_trip_across_page_boundary() {
        let (mut spt, mut pagedir, pool) = fixture(2, true);
        let dst = V + PAGE_SIZE - 3;

        copy_out(&mut spt, &mut pagedir, &pool, dst, b"abcdef").unwrap();
        let mut back = [0u8; 6];
        copy_in(&mut spt, &mut pagedir, &pool, dst, &mut back).unwrap();
        assert_eq!(&back, b"abcdef");

        // Both touched pages were paged in and dirtied.
        assert_eq!(pool.in_use(), 2);
        assert!(pagedir.is_dirty(V));
        assert!(pagedir.is_dirty(V + PAGE_SIZE));
    }

    #[test]
    fn test_copy_in_leaves_pages_clean() {
        let (mut spt, mut pagedir, pool) = fixture(1, true);
        let mut buf = [0u8; 4];
        copy_in(&mut spt, &mut pagedir, &pool, V, &mut buf).unwrap();
        assert!(pagedir.is_accessed(V));
        assert!(!pagedir.is_dirty(V));
    }

    #[test]
    fn test_copy_out_readonly_terminates() {
        let (mut spt, mut pagedir, pool) = fixture(1, false);
        assert_eq!(
            copy_out(&mut spt, &mut pagedir, &pool, V, b"x"),
            Err(Exit::BAD_ACCESS)
        );
        // Rejected before any page-in happened.
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_copy_undeclared_terminates() {
        let (mut spt, mut pagedir, pool) = fixture(1, true);
        let mut buf = [0u8; 8];
        assert_eq!(
            copy_in(&mut spt, &mut pagedir, &pool, V + PAGE_SIZE - 4, &mut buf),
            Err(Exit::BAD_ACCESS)
        );
    }

    #[test]
    fn test_cstr_copy() {
        let (mut spt, mut pagedir, pool) = fixture(1, true);
        copy_out(&mut spt, &mut pagedir, &pool, V + 10, b"hello\0").unwrap();
        let s = copy_in_cstr(&mut spt, &mut pagedir, &pool, V + 10).unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn test_cstr_runs_off_declared_memory() {
        let (mut spt, mut pagedir, pool) = fixture(1, true);
        // Fill the page with non-NUL bytes so the scan crosses the boundary.
        copy_out(&mut spt, &mut pagedir, &pool, V, &[1u8; PAGE_SIZE]).unwrap();
        assert_eq!(
            copy_in_cstr(&mut spt, &mut pagedir, &pool, V + 10),
            Err(Exit::BAD_ACCESS)
        );
    }
}
