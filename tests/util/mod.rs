//! Test automation.

#![allow(dead_code)]

use std::env;
use std::process::{Command, Output};
use std::ptr;
use std::thread;

use palloc::{Allocator, GroupId, GENERAL};

/// An allocator with a small bootstrap region, cheap enough to create per test.
pub type Small = Allocator<4096>;

/// Create and start an allocator.
pub fn started(max_groups: usize, page_size: usize) -> Small {
    let allocator = Small::with_bootstrap();
    assert!(allocator.start(max_groups, page_size));
    allocator
}

/// Fill `len` bytes at `ptr` with a pattern derived from `seed`.
pub unsafe fn fill(ptr: *mut u8, len: usize, seed: u8) {
    for i in 0..len {
        *ptr.add(i) = seed.wrapping_add(i as u8);
    }
}

/// Check a pattern written by `fill`.
pub unsafe fn check(ptr: *const u8, len: usize, seed: u8) {
    for i in 0..len {
        assert_eq!(*ptr.add(i), seed.wrapping_add(i as u8), "Corrupted byte {} of {:p}.", i, ptr);
    }
}

/// "Multiply" a closure, by running it in multiple threads at the same time.
pub fn multiply<F: Fn() + Sync>(func: F) {
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(&func);
        }
    });
}

/// Wrap a block in acid tests.
///
/// This performs a number of temporary allocations in `group` to try to detect inconsistency.
///
/// The basic idea is that if the allocator is broken, it might allocate the same memory twice, or
/// corrupt when allocating. Thus, we allocate some temporary segments and fill them. This way we
/// might be able to detect memory corruption through asserting memory consistency after the
/// closure is completed.
pub fn acid<F: FnOnce()>(allocator: &Small, group: GroupId, func: F) {
    let sizes = [8, 100, 33, 512, 16];
    let mut bufs = [ptr::null_mut(); 5];

    unsafe {
        for (n, (&size, buf)) in sizes.iter().zip(bufs.iter_mut()).enumerate() {
            *buf = allocator.alloc(size, 16, group);
            assert!(!buf.is_null());
            fill(*buf, size, n as u8);
        }

        func();

        for (n, (&size, &buf)) in sizes.iter().zip(bufs.iter()).enumerate() {
            check(buf, size, n as u8);
            allocator.free(buf);
        }
    }
}

/// Acid test in the general group.
pub fn acid_general<F: FnOnce()>(allocator: &Small, func: F) {
    acid(allocator, GENERAL, func)
}

/// The variable marking a re-run of the test binary as a child.
const CHILD: &str = "PALLOC_TEST_CHILD";

/// Are we the child of `run_child`?
pub fn is_child() -> bool {
    env::var_os(CHILD).is_some()
}

/// Re-run a single test of the current binary in a child process.
pub fn run_child(test: &str) -> Output {
    let exe = env::current_exe().expect("Test binary path.");

    Command::new(exe)
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD, "1")
        .output()
        .expect("Cannot spawn the test binary.")
}
