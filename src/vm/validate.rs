//! User-Pointer Validation
//!
//! Every pointer-typed system-call argument passes through here before the
//! kernel dereferences it. A failed check is not an error the caller sees:
//! it is a process-terminating condition, modeled as the [`Exit`] value and
//! propagated with `?` to the dispatch boundary, which runs the real
//! teardown. Validation code never unwinds and never returns to user code
//! after a violation.

use crate::vm::page::PageDescriptor;
use crate::vm::spt::SupplementalPageTable;
use crate::vm::is_user_vaddr;

/// Process-terminating condition carrying the recorded exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    /// Status reported to the parent
    pub status: i32,
}

impl Exit {
    /// Termination for an invalid memory access
    pub const BAD_ACCESS: Self = Self { status: -1 };

    /// Normal or forced exit with `status`
    pub const fn with_status(status: i32) -> Self {
        Self { status }
    }
}

/// Result type for operations that may terminate the calling process
pub type UserResult<T> = Result<T, Exit>;

/// Check one user address and look up its page
///
/// Terminates the process for null or out-of-range addresses. An in-range
/// address with no declared page yields `Ok(None)`: that state is legal here,
/// and the caller decides whether it is fatal for its operation.
pub fn validate_address(
    spt: &SupplementalPageTable,
    addr: usize,
) -> UserResult<Option<&PageDescriptor>> {
    if addr == 0 || !is_user_vaddr(addr) {
        return Err(Exit::BAD_ACCESS);
    }
    Ok(spt.lookup(addr))
}

/// Check every byte of a user buffer
///
/// Each byte position must land on a declared page, writable when
/// `must_be_writable` is set. The check is byte-by-byte rather than
/// page-by-page; redundant within a page, but the loop stays trivially
/// correct for any base/length combination.
pub fn validate_buffer(
    spt: &SupplementalPageTable,
    base: usize,
    length: usize,
    must_be_writable: bool,
) -> UserResult<()> {
    for i in 0..length {
        let addr = base.wrapping_add(i);
        let descriptor = validate_address(spt, addr)?.ok_or(Exit::BAD_ACCESS)?;
        if must_be_writable && !descriptor.writable {
            return Err(Exit::BAD_ACCESS);
        }
    }
    Ok(())
}

/// Check the page holding a user string pointer
///
/// Only the first page is checked; a string that runs off that page onto an
/// undeclared one is not caught here. Kept as-is deliberately rather than
/// silently strengthened.
pub fn validate_string(spt: &SupplementalPageTable, ptr: usize) -> UserResult<()> {
    validate_address(spt, ptr)?.ok_or(Exit::BAD_ACCESS)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
