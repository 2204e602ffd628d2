//! Page-In Service
//!
//! Resolves a fault on a declared page: allocate a frame, populate it from
//! the page's backing (file read or zero-fill), install the translation, and
//! mark the descriptor resident. The architecture's fault entry and the
//! kernel-side user-memory copies both land here.

use log::trace;

use crate::frame::FrameAllocator;
use crate::pagedir::PageDir;
use crate::vm::load::{load_page, LoadError};
use crate::vm::page::PageBacking;
use crate::vm::spt::SupplementalPageTable;
use crate::vm::trunc_page;

/// Page-in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultError {
    /// No descriptor is declared for the faulting address
    NotDeclared,
    /// Physical memory is exhausted
    OutOfFrames,
    /// Populating the frame from the backing file failed
    Load(LoadError),
}

/// Make the page containing `fault_addr` resident
///
/// A page that is already resident is left alone. On any failure no state
/// changes: the descriptor stays non-resident and any allocated frame goes
/// back to the pool.
pub fn page_in(
    spt: &mut SupplementalPageTable,
    pagedir: &mut PageDir,
    frames: &dyn FrameAllocator,
    fault_addr: usize,
) -> Result<(), FaultError> {
    let page = trunc_page(fault_addr);
    let descriptor = spt.lookup_mut(page).ok_or(FaultError::NotDeclared)?;
    if descriptor.resident {
        return Ok(());
    }

    let frame = frames.allocate().ok_or(FaultError::OutOfFrames)?;

    let populated = match &descriptor.backing {
        PageBacking::Anonymous { .. } => {
            // Frames leave the allocator zeroed; nothing to do.
            Ok(())
        }
        PageBacking::Binary { .. } | PageBacking::File { .. } => {
            // The lazy read goes through the file subsystem; callers on the
            // syscall path copy user memory outside their own lock scope.
            let _guard = crate::fs::filesys_lock();
            frame.with_bytes(|bytes| load_page(descriptor, bytes))
        }
    };
    if let Err(err) = populated {
        frames.release(frame);
        return Err(FaultError::Load(err));
    }

    let installed = pagedir.map(page, frame, descriptor.writable);
    debug_assert!(installed, "non-resident page had a live translation");
    descriptor.resident = true;
    trace!("page_in: {page:#x} now resident");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
