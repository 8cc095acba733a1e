//! System primitives.
//!
//! Everything in here talks to libc directly and never allocates through the Rust allocator, so it
//! is usable from inside the global allocator.

use std::mem;

use crate::ptr::Pointer;

/// The file descriptor of the standard output.
pub const STDOUT: libc::c_int = 1;
/// The file descriptor of the standard error.
pub const STDERR: libc::c_int = 2;

/// The longest path `open_append` accepts.
const MAX_PATH: usize = 256;

/// Obtain `size` bytes aligned to `align` from the process heap.
///
/// Returns `None` when the system refuses.
pub fn alloc(size: usize, align: usize) -> Option<Pointer<u8>> {
    let align = align.max(mem::size_of::<usize>());
    let mut ptr: *mut libc::c_void = std::ptr::null_mut();

    if unsafe { libc::posix_memalign(&mut ptr, align, size) } != 0 {
        return None;
    }

    Pointer::from_raw(ptr as *mut u8)
}

/// Give memory obtained through `alloc` back to the system.
///
/// # Safety
///
/// `ptr` must come from `alloc` and must not be used afterwards.
pub unsafe fn free(ptr: Pointer<u8>) {
    libc::free(*ptr as *mut libc::c_void);
}

/// Write all of `buf` to a file descriptor.
pub fn write(fd: libc::c_int, mut buf: &[u8]) -> Result<(), ()> {
    while !buf.is_empty() {
        let res = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };

        if res < 0 {
            if last_errno_is_interrupt() {
                continue;
            }

            return Err(());
        }

        buf = &buf[res as usize..];
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn last_errno_is_interrupt() -> bool {
    unsafe { *libc::__errno_location() == libc::EINTR }
}

#[cfg(not(target_os = "linux"))]
fn last_errno_is_interrupt() -> bool {
    false
}

/// Open (or create) a file for appending.
///
/// Missing parent directories are created. The path is copied to a stack buffer to
/// terminate it, hence paths longer than `MAX_PATH` are rejected.
pub fn open_append(path: &str) -> Option<libc::c_int> {
    let mut buf = [0u8; MAX_PATH];
    if path.is_empty() || path.len() >= MAX_PATH || path.as_bytes().contains(&0) {
        return None;
    }
    buf[..path.len()].copy_from_slice(path.as_bytes());

    // Temporarily terminate at each slash to name the directories on the way.
    for (slash, _) in path.match_indices('/').filter(|&(n, _)| n > 0) {
        buf[slash] = 0;
        unsafe {
            libc::mkdir(buf.as_ptr() as *const libc::c_char, 0o755);
        }
        buf[slash] = b'/';
    }

    let fd = unsafe {
        libc::open(
            buf.as_ptr() as *const libc::c_char,
            libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
            0o644 as libc::c_uint,
        )
    };

    if fd < 0 {
        None
    } else {
        Some(fd)
    }
}

/// Close a file descriptor obtained through `open_append`.
pub fn close(fd: libc::c_int) {
    unsafe {
        libc::close(fd);
    }
}

/// Halt the process.
///
/// This never unwinds, and thus never allocates.
#[cold]
pub fn halt() -> ! {
    std::process::abort()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_alloc_aligned() {
        for &align in &[8, 16, 64, 4096] {
            let ptr = alloc(100, align).unwrap();
            assert!(ptr.aligned_to(align));

            unsafe {
                std::ptr::write_bytes(*ptr, 0xAB, 100);
                free(ptr);
            }
        }
    }

    #[test]
    fn test_oom() {
        assert!(alloc(usize::MAX / 2, 16).is_none());
    }

    #[test]
    fn test_open_append_creates_directories() {
        let dir = std::env::temp_dir().join(format!("palloc-sys-{}", std::process::id()));
        let path = dir.join("a").join("b.log");
        let path_str = path.to_str().unwrap();

        for line in &["one\n", "two\n"] {
            let fd = open_append(path_str).unwrap();
            write(fd, line.as_bytes()).unwrap();
            close(fd);
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_open_rejects_long_paths() {
        let long = "x".repeat(MAX_PATH);
        assert!(open_append(&long).is_none());
        assert!(open_append("").is_none());
    }
}
