//! Direct, non-allocating output.
//!
//! The allocator cannot use `std::io` (which may allocate, and thus recurse into the allocator), so
//! all of its diagnostics go through the primitives in here.

use std::fmt;

use crate::sys;

/// The size of the staging buffer of a `Writer`.
const STAGING_SIZE: usize = 256;

/// A buffered writer to a file descriptor.
///
/// Text is staged in a fixed buffer, which is flushed when full and on drop.
pub struct Writer {
    /// The target.
    fd: libc::c_int,
    /// The staging buffer.
    buf: [u8; STAGING_SIZE],
    /// The number of staged bytes.
    len: usize,
}

impl Writer {
    /// Standard output.
    pub fn stdout() -> Writer {
        Writer::new(sys::STDOUT)
    }

    /// Standard error output.
    pub fn stderr() -> Writer {
        Writer::new(sys::STDERR)
    }

    /// A writer to an arbitrary file descriptor.
    pub fn new(fd: libc::c_int) -> Writer {
        Writer {
            fd,
            buf: [0; STAGING_SIZE],
            len: 0,
        }
    }

    /// Write the staged bytes out.
    pub fn flush(&mut self) -> fmt::Result {
        let res = sys::write(self.fd, &self.buf[..self.len]);
        self.len = 0;

        res.map_err(|_| fmt::Error)
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();

        while !bytes.is_empty() {
            if self.len == STAGING_SIZE {
                self.flush()?;
            }

            let amt = bytes.len().min(STAGING_SIZE - self.len);
            self.buf[self.len..self.len + amt].copy_from_slice(&bytes[..amt]);
            self.len += amt;
            bytes = &bytes[amt..];
        }

        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// A truncating writer into a borrowed buffer.
///
/// This simply keeps track of the buffer by maintaining a slice representing the remaining part of
/// the buffer. Text beyond the end is dropped and `truncated` is raised.
pub struct BufWriter<'a> {
    /// A view into the remaining part of the buffer.
    buffer: &'a mut [u8],
    /// Has anything been dropped?
    truncated: bool,
}

impl<'a> BufWriter<'a> {
    /// Write into `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> BufWriter<'a> {
        BufWriter {
            buffer,
            truncated: false,
        }
    }

    /// The number of bytes left.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// Was the output cut short?
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> fmt::Write for BufWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let amt = s.len().min(self.buffer.len());
        if amt < s.len() {
            self.truncated = true;
        }

        let buffer = std::mem::take(&mut self.buffer);
        let (head, tail) = buffer.split_at_mut(amt);
        head.copy_from_slice(&s.as_bytes()[..amt]);
        self.buffer = tail;

        Ok(())
    }
}

/// Report a failed assertion on stderr and halt.
#[cold]
pub fn assertion_failed(file: &str, line: u32, cond: &str, args: fmt::Arguments) -> ! {
    use std::fmt::Write;

    {
        let mut out = Writer::stderr();
        let _ = write!(out, "[ASSERT FATAL] {}:{}: `{}` - ", file, line, cond);
        let _ = out.write_fmt(args);
        let _ = out.write_str("\n");
    }

    sys::halt()
}

/// Make a runtime assertion which halts the process.
///
/// It differs from the one provided by `std` in the failure strategy: it writes straight to
/// stderr and aborts, never allocating nor unwinding. This makes it usable inside the allocator
/// and independent of the logger.
macro_rules! raw_assert {
    ($e:expr) => {
        raw_assert!($e, "No description.")
    };
    ($e:expr, $( $arg:tt )+) => {{
        if !$e {
            $crate::write::assertion_failed(file!(), line!(), stringify!($e),
                                            format_args!($( $arg )+));
        }
    }};
}

/// Make a runtime assertion in debug builds.
///
/// The only way it differs from the one provided by `std` is the failure strategy: like
/// `raw_assert!`, it halts without allocating, so it is safe while a group is locked.
macro_rules! debug_assert {
    ($e:expr, $( $arg:tt )+) => {{
        if cfg!(debug_assertions) {
            raw_assert!($e, $( $arg )+);
        }
    }};
}
