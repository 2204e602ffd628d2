//! File-Subsystem Seam
//!
//! The VM core never owns a real file system. It consumes an open-file
//! abstraction (length / read-at / write-at / reopen) and a name-keyed
//! file-system abstraction (open / create / remove), both defined here as
//! traits so the kernel binary can supply its disk implementation.
//!
//! ## Locking
//!
//! All file-subsystem operations system-wide are serialized by one global
//! lock. Callers take it through [`filesys_lock`], which returns a scoped
//! guard: the lock is released on drop, so every exit path out of a system
//! call, including process termination, releases it.
//!
//! ## In-memory files
//!
//! [`MemFile`] and [`MemFs`] implement the seam over byte vectors. They back
//! the boot ramdisk and the test suite. Each inode keeps read/write counters
//! so write-back behavior is observable.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use spin::{Mutex, MutexGuard};

// ============================================================================
// Errors
// ============================================================================

/// File-subsystem failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Named file does not exist
    NotFound,
    /// A file with that name already exists
    Exists,
    /// Read or write touched fewer bytes than requested
    ShortIo,
    /// Handle cannot be duplicated
    ReopenFailed,
}

// ============================================================================
// Seam Traits
// ============================================================================

/// Shared handle to an open file
pub type FileRef = Arc<dyn File + Send + Sync>;

/// An open file as the VM core sees it
///
/// Handles are positionless; the per-descriptor seek offset lives in the
/// process's open-file table. Mappings use only `length`, `read_at` and
/// `write_at`.
pub trait File {
    /// Current file length in bytes
    fn length(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`, returning the count read
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;

    /// Write `buf` at `offset`, returning the count written
    ///
    /// Writes to a write-denied file succeed with a count of zero.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, FsError>;

    /// Open an independent handle to the same underlying file
    ///
    /// Closing the original handle must not invalidate the clone; memory
    /// mappings rely on this for their independent lifetime.
    fn reopen(&self) -> Result<FileRef, FsError>;

    /// Refuse writes through any handle until a matching `allow_write`
    fn deny_write(&self);

    /// Re-permit writes denied by `deny_write`
    fn allow_write(&self);
}

/// Name-keyed file-system operations consumed by the syscall layer
pub trait FileSystem {
    /// Open an existing file
    fn open(&self, name: &str) -> Result<FileRef, FsError>;

    /// Create an empty file of `initial_size` zero bytes
    fn create(&self, name: &str, initial_size: u64) -> Result<(), FsError>;

    /// Remove a file by name; open handles keep their contents alive
    fn remove(&self, name: &str) -> Result<(), FsError>;
}

// ============================================================================
// Global File-Subsystem Lock
// ============================================================================

static FILESYS_LOCK: Mutex<()> = Mutex::new(());

/// Acquire the global file-subsystem lock
///
/// At most one file-subsystem operation is in flight system-wide while the
/// returned guard lives. Dropping the guard releases the lock.
pub fn filesys_lock() -> MutexGuard<'static, ()> {
    FILESYS_LOCK.lock()
}

// ============================================================================
// In-Memory Files
// ============================================================================

/// Shared backing store for one in-memory file
struct MemInode {
    data: Mutex<Vec<u8>>,
    /// Non-zero while any handle denies writes
    deny_write: AtomicU32,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemInode {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
            deny_write: AtomicU32::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }
}

/// In-memory file handle
///
/// Clones produced by [`File::reopen`] share the inode but are independent
/// handles, matching the reopen contract.
pub struct MemFile {
    inode: Arc<MemInode>,
}

impl MemFile {
    /// Create a detached in-memory file with the given contents
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inode: Arc::new(MemInode::new(data)),
        }
    }

    /// Create a detached in-memory file behind a shared handle
    pub fn new_ref(data: Vec<u8>) -> FileRef {
        Arc::new(Self::new(data))
    }

    /// Number of `read_at` calls that reached the inode
    pub fn read_count(&self) -> u64 {
        self.inode.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_at` calls that modified the inode
    pub fn write_count(&self) -> u64 {
        self.inode.writes.load(Ordering::Relaxed)
    }

    /// Snapshot of the current contents
    pub fn contents(&self) -> Vec<u8> {
        self.inode.data.lock().clone()
    }
}

impl File for MemFile {
    fn length(&self) -> u64 {
        self.inode.data.lock().len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let data = self.inode.data.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        self.inode.reads.fetch_add(1, Ordering::Relaxed);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        if self.inode.deny_write.load(Ordering::Acquire) != 0 {
            return Ok(0);
        }
        let mut data = self.inode.data.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        // Files do not grow through write_at; clamp to the current length.
        let n = buf.len().min(data.len() - offset);
        data[offset..offset + n].copy_from_slice(&buf[..n]);
        self.inode.writes.fetch_add(1, Ordering::Relaxed);
        Ok(n)
    }

    fn reopen(&self) -> Result<FileRef, FsError> {
        Ok(Arc::new(MemFile {
            inode: Arc::clone(&self.inode),
        }))
    }

    fn deny_write(&self) {
        self.inode.deny_write.fetch_add(1, Ordering::AcqRel);
    }

    fn allow_write(&self) {
        self.inode.deny_write.fetch_sub(1, Ordering::AcqRel);
    }
}

// ============================================================================
// In-Memory File System
// ============================================================================

/// Name-keyed set of in-memory files
pub struct MemFs {
    files: Mutex<Vec<(String, Arc<MemInode>)>>,
}

impl MemFs {
    /// Create an empty file system
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
        }
    }

    /// Install a file with the given name and contents, replacing any old one
    pub fn install(&self, name: &str, data: Vec<u8>) {
        let mut files = self.files.lock();
        files.retain(|(n, _)| n.as_str() != name);
        files.push((String::from(name), Arc::new(MemInode::new(data))));
    }

    /// Install `file` under `name`, sharing its backing store
    ///
    /// Handles opened through the file system then hit the same inode as
    /// `file`, so its contents and I/O counters stay observable.
    pub fn install_shared(&self, name: &str, file: &MemFile) {
        let mut files = self.files.lock();
        files.retain(|(n, _)| n.as_str() != name);
        files.push((String::from(name), Arc::clone(&file.inode)));
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn open(&self, name: &str) -> Result<FileRef, FsError> {
        let files = self.files.lock();
        for (n, inode) in files.iter() {
            if n.as_str() == name {
                return Ok(Arc::new(MemFile {
                    inode: Arc::clone(inode),
                }));
            }
        }
        Err(FsError::NotFound)
    }

    fn create(&self, name: &str, initial_size: u64) -> Result<(), FsError> {
        let mut files = self.files.lock();
        if files.iter().any(|(n, _)| n.as_str() == name) {
            return Err(FsError::Exists);
        }
        files.push((
            String::from(name),
            Arc::new(MemInode::new(alloc::vec![0u8; initial_size as usize])),
        ));
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), FsError> {
        let mut files = self.files.lock();
        let before = files.len();
        files.retain(|(n, _)| n.as_str() != name);
        if files.len() == before {
            return Err(FsError::NotFound);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_at() {
        let file = MemFile::new(alloc::vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        assert_eq!(file.read_at(&mut buf, 1), Ok(2));
        assert_eq!(buf, [2, 3]);

        assert_eq!(file.write_at(&[9, 9], 2), Ok(2));
        assert_eq!(file.contents(), alloc::vec![1, 2, 9, 9]);

        // Past-end access touches nothing.
        assert_eq!(file.read_at(&mut buf, 10), Ok(0));
        assert_eq!(file.write_at(&[7], 10), Ok(0));
    }

    #[test]
    fn test_reopen_shares_contents() {
        let file = MemFile::new(alloc::vec![0; 4]);
        let clone = file.reopen().unwrap();
        assert_eq!(clone.write_at(&[5], 0), Ok(1));
        assert_eq!(file.contents()[0], 5);
        assert_eq!(file.write_count(), 1);
    }

    #[test]
    fn test_deny_write() {
        let file = MemFile::new(alloc::vec![0; 4]);
        file.deny_write();
        assert_eq!(file.write_at(&[5], 0), Ok(0));
        assert_eq!(file.contents()[0], 0);
        file.allow_write();
        assert_eq!(file.write_at(&[5], 0), Ok(1));
    }

    #[test]
    fn test_memfs_open_create_remove() {
        let fs = MemFs::new();
        assert_eq!(fs.open("a").err(), Some(FsError::NotFound));
        assert_eq!(fs.create("a", 4), Ok(()));
        assert_eq!(fs.create("a", 4).err(), Some(FsError::Exists));

        let handle = fs.open("a").unwrap();
        assert_eq!(handle.length(), 4);

        assert_eq!(fs.remove("a"), Ok(()));
        assert_eq!(fs.remove("a").err(), Some(FsError::NotFound));
        // The open handle outlives removal.
        assert_eq!(handle.length(), 4);
    }
}
