//! Common types used across Pintail VM
//!
//! This module defines shared identifier types to avoid circular dependencies.

use core::sync::atomic::{AtomicU64, Ordering};

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pid(pub u64);

impl Pid {
    /// Create a new process ID with a unique auto-incremented value
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Pid(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// File descriptor index into a process's open-file table
pub type Fd = usize;
