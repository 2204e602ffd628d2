//! End-to-end exercises of the VM core through the syscall boundary:
//! a fake console/registry environment, an in-memory file system, and a
//! process with a declared stack page issuing real call frames.

use pintail_vm::syscall::{
    SYS_CLOSE, SYS_EXIT, SYS_MMAP, SYS_MUNMAP, SYS_OPEN, SYS_READ, SYS_WRITE,
};
use pintail_vm::vm::usermem::{copy_in, copy_out};
use pintail_vm::{
    handle, File, MemFile, MemFs, Outcome, PoolFrameAllocator, Process, SyscallCtx, SyscallEnv,
    TrapFrame, KERNEL_BASE, PAGE_SIZE,
};

struct TestEnv {
    console: Vec<u8>,
    input: Vec<u8>,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            console: Vec::new(),
            input: Vec::new(),
        }
    }
}

impl SyscallEnv for TestEnv {
    fn console_read(&mut self) -> u8 {
        if self.input.is_empty() {
            b'\n'
        } else {
            self.input.remove(0)
        }
    }

    fn console_write(&mut self, bytes: &[u8]) {
        self.console.extend_from_slice(bytes);
    }

    fn exec(&mut self, _command: &str) -> i32 {
        -1
    }

    fn wait(&mut self, _pid: i32) -> i32 {
        -1
    }

    fn halt(&mut self) -> ! {
        panic!("halt requested in test");
    }
}

/// A process with one writable stack page under KERNEL_BASE
fn process_with_stack() -> Process {
    let mut process = Process::new("testproc");
    process.declare_stack(KERNEL_BASE, 1).unwrap();
    process
}

const ESP: usize = KERNEL_BASE - 64;
const STR_AT: usize = KERNEL_BASE - PAGE_SIZE;

/// Lay out a call frame (number + argument words) at ESP
fn push_call(process: &mut Process, pool: &PoolFrameAllocator, words: &[u32]) -> TrapFrame {
    let mut bytes = Vec::new();
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    copy_out(&mut process.spt, &mut process.pagedir, pool, ESP, &bytes).unwrap();
    TrapFrame { esp: ESP }
}

/// Place a NUL-terminated string at the bottom of the stack page
fn push_str(process: &mut Process, pool: &PoolFrameAllocator, s: &str) {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    copy_out(&mut process.spt, &mut process.pagedir, pool, STR_AT, &bytes).unwrap();
}

#[test]
fn map_write_unmap_writes_back_once() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let data = MemFile::new(vec![7u8]);
    fs.install_shared("data.bin", &data);
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    // open("data.bin") -> fd 2
    push_str(&mut process, &pool, "data.bin");
    let frame = push_call(&mut process, &pool, &[SYS_OPEN, STR_AT as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(2));

    // mmap(2, A): a 1-byte file maps as a single page.
    let map_at: usize = 0x0900_0000;
    let frame = push_call(&mut process, &pool, &[SYS_MMAP, 2, map_at as u32]);
    let Outcome::Continue(id) = handle(&mut process, &frame, &mut ctx) else {
        panic!("mmap terminated the process");
    };
    assert!(id >= 0);
    let descriptor = process.spt.lookup(map_at).expect("mapped page declared");
    let (_, geometry) = descriptor.file_backing().unwrap();
    assert_eq!(geometry.read_bytes, 1);
    assert_eq!(geometry.zero_bytes, PAGE_SIZE - 1);
    assert!(process.spt.lookup(map_at + PAGE_SIZE).is_none());

    // The mapping survives closing the descriptor it came from.
    let frame = push_call(&mut process, &pool, &[SYS_CLOSE, 2]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(0));

    // Store through the mapping; the page faults in and dirties.
    copy_out(&mut process.spt, &mut process.pagedir, &pool, map_at, &[9]).unwrap();
    assert_eq!(data.write_count(), 0);

    // munmap flushes exactly one read_bytes-sized write at offset 0.
    let frame = push_call(&mut process, &pool, &[SYS_MUNMAP, id as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(0));
    assert_eq!(data.write_count(), 1);
    assert_eq!(data.contents(), vec![9u8]);
    assert!(process.spt.lookup(map_at).is_none());
    // Only the stack page's frame remains in use.
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn clean_mapping_unmaps_without_io() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let data = MemFile::new(vec![1u8; PAGE_SIZE + 1]);
    fs.install_shared("big.bin", &data);
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    push_str(&mut process, &pool, "big.bin");
    let frame = push_call(&mut process, &pool, &[SYS_OPEN, STR_AT as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(2));

    let map_at: usize = 0x0900_0000;
    let frame = push_call(&mut process, &pool, &[SYS_MMAP, 2, map_at as u32]);
    let Outcome::Continue(id) = handle(&mut process, &frame, &mut ctx) else {
        panic!("mmap terminated the process");
    };
    assert!(process.spt.lookup(map_at + PAGE_SIZE).is_some());

    // Read both pages in without storing.
    let mut buf = [0u8; 2];
    copy_in(
        &mut process.spt,
        &mut process.pagedir,
        &pool,
        map_at + PAGE_SIZE - 1,
        &mut buf,
    )
    .unwrap();
    assert_eq!(buf, [1, 1]);

    let frame = push_call(&mut process, &pool, &[SYS_MUNMAP, id as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(0));
    assert_eq!(data.write_count(), 0);
}

#[test]
fn console_write_reaches_env() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    push_str(&mut process, &pool, "hello");
    let frame = push_call(&mut process, &pool, &[SYS_WRITE, 1, STR_AT as u32, 5]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(5));
    assert_eq!(env.console, b"hello");
}

#[test]
fn bad_buffer_terminates_and_reclaims() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    // read(0, buf, n) with a buffer below the user range: fatal.
    let frame = push_call(&mut process, &pool, &[SYS_READ, 0, 0x5000, 8]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Exited(-1));
    assert_eq!(process.exit_status, Some(-1));
    assert!(process.spt.is_empty());
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn exit_flushes_dirty_mappings() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let data = MemFile::new(vec![0u8; 10]);
    fs.install_shared("data.bin", &data);
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    push_str(&mut process, &pool, "data.bin");
    let frame = push_call(&mut process, &pool, &[SYS_OPEN, STR_AT as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(2));
    let map_at: usize = 0x0900_0000;
    let frame = push_call(&mut process, &pool, &[SYS_MMAP, 2, map_at as u32]);
    assert!(matches!(
        handle(&mut process, &frame, &mut ctx),
        Outcome::Continue(id) if id >= 0
    ));
    copy_out(&mut process.spt, &mut process.pagedir, &pool, map_at, b"abc").unwrap();

    // exit(0) tears everything down, flushing the dirty page on the way.
    let frame = push_call(&mut process, &pool, &[SYS_EXIT, 0]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Exited(0));
    assert_eq!(data.write_count(), 1);
    assert_eq!(&data.contents()[..3], b"abc");
    assert_eq!(pool.in_use(), 0);
    assert!(process.mmaps.is_empty());
}

#[test]
fn opening_own_image_denies_writes_until_close() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let image = MemFile::new(vec![7u8; 4]);
    fs.install_shared("testproc", &image);
    let other = MemFile::new(vec![0u8; 4]);
    fs.install_shared("other.bin", &other);
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    // open("testproc") from the process named testproc: its image locks.
    push_str(&mut process, &pool, "testproc");
    let frame = push_call(&mut process, &pool, &[SYS_OPEN, STR_AT as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(2));
    assert_eq!(image.write_at(&[9], 0), Ok(0));

    // Files under other names stay writable.
    push_str(&mut process, &pool, "other.bin");
    let frame = push_call(&mut process, &pool, &[SYS_OPEN, STR_AT as u32]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(3));
    assert_eq!(other.write_at(&[9], 0), Ok(1));

    // Closing the descriptor lifts the deny.
    let frame = push_call(&mut process, &pool, &[SYS_CLOSE, 2]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(0));
    assert_eq!(image.write_at(&[9], 0), Ok(1));
}

#[test]
fn unknown_fd_operations_report_failure() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    // mmap of an unopened descriptor: the -1 sentinel, not termination.
    let frame = push_call(&mut process, &pool, &[SYS_MMAP, 5, 0x0900_0000]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(-1));

    // munmap of an unknown mapping id: silent no-op.
    let frame = push_call(&mut process, &pool, &[SYS_MUNMAP, 42]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Continue(0));
    assert!(process.exit_status.is_none());
}

#[test]
fn unrecognized_call_number_terminates() {
    let pool = PoolFrameAllocator::new(16);
    let fs = MemFs::new();
    let mut env = TestEnv::new();
    let mut ctx = SyscallCtx {
        fs: &fs,
        frames: &pool,
        env: &mut env,
    };
    let mut process = process_with_stack();

    let frame = push_call(&mut process, &pool, &[99]);
    assert_eq!(handle(&mut process, &frame, &mut ctx), Outcome::Exited(-1));
    assert_eq!(process.exit_status, Some(-1));
}
