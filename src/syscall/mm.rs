//! Memory-Mapping System Calls
//!
//! Bridges the descriptor table to the mapping table. Failures here are
//! reported, not fatal: a caller probing addresses with map requests is
//! legitimate, so every rejection comes back as the -1 sentinel.

use crate::fs::filesys_lock;
use crate::process::{Process, MAX_FD};
use crate::syscall::SyscallCtx;
use crate::vm::page::MappingId;

/// Map the file at `fd` starting at `addr`; returns the mapping id or -1
pub fn sys_mmap(process: &mut Process, fd: usize, addr: usize) -> i32 {
    if !(2..MAX_FD).contains(&fd) {
        return -1;
    }
    let Process {
        spt, fds, mmaps, ..
    } = process;
    let Some(open) = fds.get(fd) else {
        return -1;
    };

    // Reopen and length both touch the file subsystem.
    let _guard = filesys_lock();
    match mmaps.map(&*open.file, addr, spt) {
        Ok(id) => id.0 as i32,
        Err(_) => -1,
    }
}

/// Tear down mapping `id`; unknown ids succeed as a no-op
pub fn sys_munmap(process: &mut Process, ctx: &mut SyscallCtx, id: i32) -> i32 {
    if id < 0 {
        return 0;
    }
    let Process {
        spt,
        pagedir,
        mmaps,
        ..
    } = process;
    // Write-back of dirty pages goes through the file subsystem.
    let _guard = filesys_lock();
    mmaps.unmap(MappingId(id as u64), spt, pagedir, ctx.frames);
    0
}
