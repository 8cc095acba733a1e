//! Allocator logging.
//!
//! A minimal, process-wide log sink. Lines are formatted into a stack buffer and emitted with one
//! `write` per target, so logging never allocates and can be used from within the allocator.

use std::fmt::{self, Write};
use std::ops;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use crate::config::LOG_BUFFER_SIZE;
use crate::sys;
use crate::write::BufWriter;

/// The severity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    /// Per-operation tracing.
    Verbose = 0,
    /// Debugging information.
    Debug = 1,
    /// Lifecycle events.
    Info = 2,
    /// Something unexpected which was recovered from.
    Warning = 3,
    /// A failed operation.
    Error = 4,
    /// The process cannot go on.
    Fatal = 5,
}

impl Level {
    fn from_u8(n: u8) -> Level {
        match n {
            0 => Level::Verbose,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warning,
            4 => Level::Error,
            _ => Level::Fatal,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Level::Verbose => "VERBOSE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.tag())
    }
}

/// A set of log targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Output(u8);

impl Output {
    /// No output.
    pub const NONE: Output = Output(0);
    /// The terminal (stderr).
    pub const TERMINAL: Output = Output(1);
    /// The log file.
    pub const FILE: Output = Output(2);
    /// Both.
    pub const ALL: Output = Output(3);

    /// Create a set from its bitmask.
    pub const fn from_bits(bits: u8) -> Output {
        Output(bits & Output::ALL.0)
    }

    /// The bitmask of this set.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Is every target of `other` in this set?
    pub const fn contains(self, other: Output) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for Output {
    type Output = Output;

    fn bitor(self, rhs: Output) -> Output {
        Output(self.0 | rhs.0)
    }
}

/// The minimal level which is emitted.
static LEVEL: AtomicU8 = AtomicU8::new(Level::Warning as u8);
/// The targets.
static OUTPUT: AtomicU8 = AtomicU8::new(Output::TERMINAL.0);
/// The log file, or -1.
static FILE: AtomicI32 = AtomicI32::new(-1);

/// The log lock.
///
/// This lock is used to avoid bungling and intertwining the log.
#[cfg(not(feature = "no_log_lock"))]
static LOG_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Configure the log sink.
///
/// When `output` contains `Output::FILE`, `file` is opened for appending. Returns `false` if that
/// fails, in which case the remaining targets are still configured.
pub fn init(level: Level, output: Output, file: &str) -> bool {
    LEVEL.store(level as u8, Ordering::SeqCst);

    let mut ok = true;
    let mut output = output;
    if output.contains(Output::FILE) {
        match sys::open_append(file) {
            Some(fd) => {
                let old = FILE.swap(fd, Ordering::SeqCst);
                if old >= 0 {
                    sys::close(old);
                }
            }
            None => {
                ok = false;
                output = Output::from_bits(output.bits() & !Output::FILE.bits());
            }
        }
    }

    OUTPUT.store(output.bits(), Ordering::SeqCst);

    ok
}

/// Close the log file and fall back to terminal-only output.
pub fn terminate() {
    OUTPUT.store(Output::TERMINAL.bits(), Ordering::SeqCst);

    let old = FILE.swap(-1, Ordering::SeqCst);
    if old >= 0 {
        sys::close(old);
    }
}

/// The current minimal level.
pub fn level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Set the minimal level.
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Would a message of this level be emitted?
pub fn enabled(level: Level) -> bool {
    level as u8 >= LEVEL.load(Ordering::Relaxed) && OUTPUT.load(Ordering::Relaxed) != 0
}

/// Write a line to the log.
///
/// Lines longer than the log buffer are cut and marked with `...`.
pub fn write(level: Level, args: fmt::Arguments, file: &str, line: u32) {
    if !enabled(level) {
        return;
    }

    // We reserve four extra bytes for the truncation marker.
    let mut buffer = [0u8; LOG_BUFFER_SIZE + 4];
    let mut filled;
    {
        let mut writer = BufWriter::new(&mut buffer[..LOG_BUFFER_SIZE - 1]);
        let _ = write!(writer, "[{:7}] {} (@ {}:{})", level, args, file, line);
        filled = LOG_BUFFER_SIZE - 1 - writer.remaining();

        if writer.truncated() {
            buffer[filled..filled + 3].copy_from_slice(b"...");
            filled += 3;
        }
    }
    buffer[filled] = b'\n';
    filled += 1;

    #[cfg(not(feature = "no_log_lock"))]
    let _guard = LOG_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let output = Output::from_bits(OUTPUT.load(Ordering::Relaxed));
    if output.contains(Output::TERMINAL) {
        let _ = sys::write(sys::STDERR, &buffer[..filled]);
    }
    if output.contains(Output::FILE) {
        let fd = FILE.load(Ordering::Relaxed);
        if fd >= 0 {
            let _ = sys::write(fd, &buffer[..filled]);
        }
    }
}

/// Log to the configured targets.
///
/// The first argument is the `Level` variant, the rest are normal formatters.
macro_rules! log {
    ($lv:ident, $( $arg:tt )+) => {
        $crate::log::write($crate::log::Level::$lv, format_args!($( $arg )+), file!(), line!())
    };
}

/// Trace a single allocator operation.
///
/// This is compiled to nothing unless the `log` feature is enabled.
macro_rules! trace {
    ($( $arg:tt )+) => {
        if cfg!(feature = "log") {
            log!(Verbose, $( $arg )+);
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(Level::Verbose < Level::Debug);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Fatal);
        assert_eq!(Level::from_u8(Level::Info as u8), Level::Info);
        assert_eq!(Level::from_u8(200), Level::Fatal);
    }

    #[test]
    fn test_output_mask() {
        assert_eq!(Output::TERMINAL | Output::FILE, Output::ALL);
        assert!(Output::ALL.contains(Output::FILE));
        assert!(!Output::TERMINAL.contains(Output::FILE));
        assert_eq!(Output::from_bits(0xFF), Output::ALL);
        assert_eq!(Output::ALL.bits(), 3);
    }

    #[test]
    fn test_level_display_pads() {
        let mut buf = [0u8; 16];
        let mut writer = BufWriter::new(&mut buf);
        write!(writer, "[{:7}]", Level::Info).unwrap();

        assert_eq!(&buf[..9], b"[INFO   ]");
    }
}
