//! Lazy Loading
//!
//! Populates a physical frame from a descriptor's file geometry. This is the
//! primitive the page-in path runs when a file- or binary-backed page is
//! first touched. It only fills bytes: marking the page resident and
//! installing the hardware translation stay with the caller.

use crate::fs::File;
use crate::vm::page::PageDescriptor;

/// Frame-population failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The descriptor has no backing file
    NoBacking,
    /// The backing file returned fewer bytes than the geometry requires
    ShortRead,
    /// The backing file reported an I/O failure
    Io,
}

/// Populate `frame` with the page described by `descriptor`
///
/// Reads `read_bytes` at `offset` from the backing file, then zero-fills the
/// trailing `zero_bytes`. A short read is unrecoverable: the page would be
/// left with undefined content, so the caller must not install it.
pub fn load_page(descriptor: &PageDescriptor, frame: &mut [u8]) -> Result<(), LoadError> {
    let (file, geometry) = descriptor.file_backing().ok_or(LoadError::NoBacking)?;

    let read = file
        .read_at(&mut frame[..geometry.read_bytes], geometry.offset)
        .map_err(|_| LoadError::Io)?;
    if read != geometry.read_bytes {
        return Err(LoadError::ShortRead);
    }

    frame[geometry.read_bytes..geometry.read_bytes + geometry.zero_bytes].fill(0);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
