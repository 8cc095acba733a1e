//! The bootstrap region.
//!
//! Before the allocator is started, requests are served by bumping an offset through a fixed
//! buffer. Nothing is ever reclaimed from it.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::block;
use crate::error::{Error, Result};
use crate::ptr::Pointer;

/// The backing buffer.
#[repr(C, align(16))]
struct Buffer<const N: usize>([u8; N]);

/// A lock-free bump region of `N` bytes.
pub struct Bootstrap<const N: usize> {
    /// The memory.
    buffer: UnsafeCell<Buffer<N>>,
    /// The number of bytes handed out, padding included.
    offset: AtomicUsize,
}

// Bytes are handed out at most once, through the atomic offset.
unsafe impl<const N: usize> Sync for Bootstrap<N> {}

impl<const N: usize> Bootstrap<N> {
    /// Create an empty region.
    pub const fn new() -> Bootstrap<N> {
        Bootstrap {
            buffer: UnsafeCell::new(Buffer([0; N])),
            offset: AtomicUsize::new(0),
        }
    }

    /// The start of the buffer.
    #[inline]
    fn base(&self) -> usize {
        self.buffer.get() as usize
    }

    /// Bump `size` bytes aligned to `align` off the region.
    pub fn alloc(&self, size: usize, align: usize) -> Result<Pointer<u8>> {
        let base = self.base();
        let mut cur = self.offset.load(Ordering::Relaxed);

        loop {
            let exhausted = Error::BootstrapExhausted {
                requested: size,
                remaining: N - cur,
            };
            let start = block::align_up(base + cur, align).ok_or(exhausted)? - base;
            let end = start.checked_add(size).ok_or(exhausted)?;
            if end > N {
                return Err(exhausted);
            }

            match self.offset.compare_exchange_weak(cur, end, Ordering::AcqRel,
                                                    Ordering::Relaxed) {
                Ok(_) => return Pointer::from_raw((base + start) as *mut u8).ok_or(exhausted),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Does the region contain `addr`?
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr < self.base() + N
    }

    /// The bytes between `addr` and the end of the region.
    #[inline]
    pub fn remaining_from(&self, addr: usize) -> usize {
        (self.base() + N).saturating_sub(addr)
    }

    /// The bytes handed out so far, padding included.
    #[inline]
    pub fn used(&self) -> usize {
        self.offset.load(Ordering::Relaxed)
    }
}
