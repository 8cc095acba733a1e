//! General error handling.
//!
//! What happens when the allocator meets a leak at shutdown or a bad pointer on release.

use std::fmt::Write;

use crate::error::Error;
use crate::stats::LeakReport;
use crate::sys;
use crate::write::Writer;

/// A leak handler.
///
/// Called by `stop` when live blocks remain. It must not return.
pub type LeakHandler = fn(LeakReport) -> !;

/// The default leak handler.
///
/// This will print the totals and halt the process.
#[cold]
pub fn default_leak_handler(report: LeakReport) -> ! {
    {
        let mut out = Writer::stderr();
        let _ = writeln!(out, "\x1b[31;1m[FATAL] {} block(s) ({} bytes) leaked. Aborting.\x1b[m",
                         report.blocks, report.bytes);
    }

    sys::halt()
}

/// Deal with a pointer which was refused by `free` or `realloc`.
///
/// Corruption and double frees are fatal in debug builds. Release builds log them and leave the
/// memory alone. Other errors are logged.
#[cold]
pub fn bad_pointer(op: &str, ptr: *mut u8, err: Error) {
    match err {
        Error::Corrupted(_) | Error::DoubleFree(_) => {
            raw_assert!(!cfg!(debug_assertions), "{} {:p}: {}.", op, ptr, err);
            log!(Error, "{} {:p}: {}. The pointer is ignored.", op, ptr, err);
        }
        _ => log!(Warning, "{} {:p}: {}. The pointer is ignored.", op, ptr, err),
    }
}
