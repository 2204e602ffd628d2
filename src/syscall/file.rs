//! File System Calls
//!
//! Descriptor-table calls on top of the file-subsystem seam. Every handler
//! that reaches the file subsystem holds the global file lock for the
//! duration of the operation; the scoped guard releases it on every return,
//! including `Exit` propagation.
//!
//! Descriptor conventions follow the dispatch table contract: 0 reads the
//! console, 1 writes it, 2..MAX_FD hold files. Query calls on a bad
//! descriptor report -1; `close` on one terminates the process.

use alloc::vec::Vec;

use crate::fs::{filesys_lock, File};
use crate::process::{Process, FD_STDIN, FD_STDOUT, MAX_FD};
use crate::syscall::SyscallCtx;
use crate::vm::usermem::{copy_in, copy_in_cstr, copy_out};
use crate::vm::validate::{validate_buffer, validate_string, Exit, UserResult};

fn fd_in_file_range(fd: usize) -> bool {
    (2..MAX_FD).contains(&fd)
}

/// Copy the user string at `ptr` in after validating it
fn user_name(process: &mut Process, ctx: &SyscallCtx, ptr: usize) -> UserResult<alloc::string::String> {
    validate_string(&process.spt, ptr)?;
    copy_in_cstr(&mut process.spt, &mut process.pagedir, ctx.frames, ptr)
}

pub fn sys_create(
    process: &mut Process,
    ctx: &mut SyscallCtx,
    name_ptr: usize,
    initial_size: u64,
) -> UserResult<i32> {
    let name = user_name(process, ctx, name_ptr)?;
    let _guard = filesys_lock();
    Ok(ctx.fs.create(&name, initial_size).is_ok() as i32)
}

pub fn sys_remove(process: &mut Process, ctx: &mut SyscallCtx, name_ptr: usize) -> UserResult<i32> {
    let name = user_name(process, ctx, name_ptr)?;
    let _guard = filesys_lock();
    Ok(ctx.fs.remove(&name).is_ok() as i32)
}

pub fn sys_open(process: &mut Process, ctx: &mut SyscallCtx, name_ptr: usize) -> UserResult<i32> {
    let name = user_name(process, ctx, name_ptr)?;
    let _guard = filesys_lock();
    let Ok(file) = ctx.fs.open(&name) else {
        return Ok(-1);
    };
    let Some(fd) = process.fds.install(file) else {
        return Ok(-1);
    };
    // A process that opens its own image must not rewrite it while running;
    // the deny lives with the descriptor and closing it re-allows.
    if name == process.name.as_str() {
        if let Some(open) = process.fds.get_mut(fd) {
            open.file.deny_write();
            open.denies_write = true;
        }
    }
    Ok(fd as i32)
}

pub fn sys_filesize(process: &mut Process, fd: usize) -> i32 {
    if !fd_in_file_range(fd) {
        return -1;
    }
    let _guard = filesys_lock();
    match process.fds.get(fd) {
        Some(open) => open.file.length() as i32,
        None => -1,
    }
}

pub fn sys_read(
    process: &mut Process,
    ctx: &mut SyscallCtx,
    fd: usize,
    buf: usize,
    size: usize,
) -> UserResult<i32> {
    validate_buffer(&process.spt, buf, size, true)?;

    if fd == FD_STDIN {
        let mut line: Vec<u8> = Vec::with_capacity(size);
        for _ in 0..size {
            line.push(ctx.env.console_read());
        }
        copy_out(&mut process.spt, &mut process.pagedir, ctx.frames, buf, &line)?;
        return Ok(size as i32);
    }
    if !fd_in_file_range(fd) {
        return Ok(-1);
    }

    let _guard = filesys_lock();
    let Some(open) = process.fds.get_mut(fd) else {
        return Ok(-1);
    };
    let mut data = alloc::vec![0u8; size];
    let n = open
        .file
        .read_at(&mut data, open.pos)
        .map_err(|_| Exit::BAD_ACCESS)?;
    open.pos += n as u64;
    drop(_guard);

    copy_out(
        &mut process.spt,
        &mut process.pagedir,
        ctx.frames,
        buf,
        &data[..n],
    )?;
    Ok(n as i32)
}

pub fn sys_write(
    process: &mut Process,
    ctx: &mut SyscallCtx,
    fd: usize,
    buf: usize,
    size: usize,
) -> UserResult<i32> {
    validate_buffer(&process.spt, buf, size, false)?;
    let mut data = alloc::vec![0u8; size];
    copy_in(
        &mut process.spt,
        &mut process.pagedir,
        ctx.frames,
        buf,
        &mut data,
    )?;

    if fd == FD_STDOUT {
        ctx.env.console_write(&data);
        return Ok(size as i32);
    }
    if !fd_in_file_range(fd) {
        return Ok(-1);
    }

    let _guard = filesys_lock();
    let Some(open) = process.fds.get_mut(fd) else {
        return Ok(-1);
    };
    let n = open
        .file
        .write_at(&data, open.pos)
        .map_err(|_| Exit::BAD_ACCESS)?;
    open.pos += n as u64;
    Ok(n as i32)
}

pub fn sys_seek(process: &mut Process, fd: usize, pos: u64) -> i32 {
    if !fd_in_file_range(fd) {
        return -1;
    }
    match process.fds.get_mut(fd) {
        Some(open) => {
            open.pos = pos;
            0
        }
        None => -1,
    }
}

pub fn sys_tell(process: &mut Process, fd: usize) -> i32 {
    if !fd_in_file_range(fd) {
        return -1;
    }
    match process.fds.get(fd) {
        Some(open) => open.pos as i32,
        None => -1,
    }
}

pub fn sys_close(process: &mut Process, fd: usize) -> UserResult<i32> {
    if !fd_in_file_range(fd) {
        return Err(Exit::BAD_ACCESS);
    }
    let _guard = filesys_lock();
    match process.fds.close(fd) {
        Some(_) => Ok(0),
        None => Err(Exit::BAD_ACCESS),
    }
}
