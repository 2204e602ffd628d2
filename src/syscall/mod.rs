//! System-Call Dispatch
//!
//! The kernel's entry point for user-initiated calls. The caller's stack
//! pointer arrives in a trap frame; the call number and every argument word
//! are fetched from user memory through the validated copy path, so a forged
//! stack pointer dies in validation before any handler runs.
//!
//! ## Termination boundary
//!
//! Handlers and validators report fatal conditions as `Err(Exit)` and never
//! tear anything down themselves. [`handle`] is the boundary: on `Err` it
//! runs the full process teardown (flush and release mappings, destroy the
//! supplemental page table, close descriptors, record the status) and tells
//! the caller the process is gone. Scoped guards mean the global file lock
//! is already released on every path that reaches the boundary.

pub mod file;
pub mod mm;

use crate::frame::FrameAllocator;
use crate::fs::FileSystem;
use crate::process::Process;
use crate::vm::usermem::{copy_in, copy_in_cstr};
use crate::vm::validate::{validate_string, Exit, UserResult};

// ============================================================================
// Call Numbers
// ============================================================================

pub const SYS_HALT: u32 = 0;
pub const SYS_EXIT: u32 = 1;
pub const SYS_EXEC: u32 = 2;
pub const SYS_WAIT: u32 = 3;
pub const SYS_CREATE: u32 = 4;
pub const SYS_REMOVE: u32 = 5;
pub const SYS_OPEN: u32 = 6;
pub const SYS_FILESIZE: u32 = 7;
pub const SYS_READ: u32 = 8;
pub const SYS_WRITE: u32 = 9;
pub const SYS_SEEK: u32 = 10;
pub const SYS_TELL: u32 = 11;
pub const SYS_CLOSE: u32 = 12;
pub const SYS_MMAP: u32 = 13;
pub const SYS_MUNMAP: u32 = 14;

// ============================================================================
// Dispatch Types
// ============================================================================

/// User register state at syscall entry, as the trap stub saved it
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    /// User stack pointer; the call number and arguments live above it
    pub esp: usize,
}

/// What became of the calling process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Call completed; the value goes back in the return register
    Continue(i32),
    /// Process terminated (normal exit or violation) with this status
    Exited(i32),
}

/// Kernel services outside this core that handlers reach
pub trait SyscallEnv {
    /// Read one byte from the console
    fn console_read(&mut self) -> u8;

    /// Write bytes to the console
    fn console_write(&mut self, bytes: &[u8]);

    /// Spawn a process from `command`, returning its pid or -1
    fn exec(&mut self, command: &str) -> i32;

    /// Wait for child `pid`, returning its exit status
    fn wait(&mut self, pid: i32) -> i32;

    /// Power the machine off
    fn halt(&mut self) -> !;
}

/// Collaborators a dispatch needs, bundled to keep handler signatures short
pub struct SyscallCtx<'a> {
    pub fs: &'a dyn FileSystem,
    pub frames: &'a dyn FrameAllocator,
    pub env: &'a mut dyn SyscallEnv,
}

// ============================================================================
// Dispatch
// ============================================================================

/// Handle one system call; the termination boundary
pub fn handle(process: &mut Process, frame: &TrapFrame, ctx: &mut SyscallCtx) -> Outcome {
    match dispatch(process, frame, ctx) {
        Ok(value) => Outcome::Continue(value),
        Err(exit) => {
            process.terminate(exit.status, ctx.frames);
            Outcome::Exited(exit.status)
        }
    }
}

/// Fetch one 32-bit word from the user stack
fn user_word(process: &mut Process, frames: &dyn FrameAllocator, addr: usize) -> UserResult<u32> {
    let mut word = [0u8; 4];
    copy_in(
        &mut process.spt,
        &mut process.pagedir,
        frames,
        addr,
        &mut word,
    )?;
    Ok(u32::from_le_bytes(word))
}

fn dispatch(process: &mut Process, frame: &TrapFrame, ctx: &mut SyscallCtx) -> UserResult<i32> {
    let number = user_word(process, ctx.frames, frame.esp)?;
    let arg = |i: usize| frame.esp + 4 * i;

    match number {
        SYS_HALT => ctx.env.halt(),
        SYS_EXIT => {
            let status = user_word(process, ctx.frames, arg(1))? as i32;
            Err(Exit::with_status(status))
        }
        SYS_EXEC => {
            let ptr = user_word(process, ctx.frames, arg(1))? as usize;
            validate_string(&process.spt, ptr)?;
            let command = copy_in_cstr(&mut process.spt, &mut process.pagedir, ctx.frames, ptr)?;
            Ok(ctx.env.exec(&command))
        }
        SYS_WAIT => {
            let pid = user_word(process, ctx.frames, arg(1))? as i32;
            Ok(ctx.env.wait(pid))
        }
        SYS_CREATE => {
            let ptr = user_word(process, ctx.frames, arg(1))? as usize;
            let size = user_word(process, ctx.frames, arg(2))? as u64;
            file::sys_create(process, ctx, ptr, size)
        }
        SYS_REMOVE => {
            let ptr = user_word(process, ctx.frames, arg(1))? as usize;
            file::sys_remove(process, ctx, ptr)
        }
        SYS_OPEN => {
            let ptr = user_word(process, ctx.frames, arg(1))? as usize;
            file::sys_open(process, ctx, ptr)
        }
        SYS_FILESIZE => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            Ok(file::sys_filesize(process, fd))
        }
        SYS_READ => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            let buf = user_word(process, ctx.frames, arg(2))? as usize;
            let size = user_word(process, ctx.frames, arg(3))? as usize;
            file::sys_read(process, ctx, fd, buf, size)
        }
        SYS_WRITE => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            let buf = user_word(process, ctx.frames, arg(2))? as usize;
            let size = user_word(process, ctx.frames, arg(3))? as usize;
            file::sys_write(process, ctx, fd, buf, size)
        }
        SYS_SEEK => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            let pos = user_word(process, ctx.frames, arg(2))? as u64;
            Ok(file::sys_seek(process, fd, pos))
        }
        SYS_TELL => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            Ok(file::sys_tell(process, fd))
        }
        SYS_CLOSE => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            file::sys_close(process, fd)
        }
        SYS_MMAP => {
            let fd = user_word(process, ctx.frames, arg(1))? as usize;
            let addr = user_word(process, ctx.frames, arg(2))? as usize;
            Ok(mm::sys_mmap(process, fd, addr))
        }
        SYS_MUNMAP => {
            let id = user_word(process, ctx.frames, arg(1))? as i32;
            Ok(mm::sys_munmap(process, ctx, id))
        }
        // An unrecognized number is as hostile as a bad pointer.
        _ => Err(Exit::BAD_ACCESS),
    }
}
