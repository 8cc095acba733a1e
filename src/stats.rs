//! Diagnostics.
//!
//! Snapshots of groups and blocks, the leak report, and the performance counters kept in debug
//! builds.

use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::block::{AllocSite, Block};
use crate::group::GroupId;
use crate::ptr::Pointer;
use crate::write::Writer;

/// A snapshot of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// The address of the payload.
    pub addr: usize,
    /// The owning group.
    pub group: GroupId,
    /// The index of the owning page.
    pub page: u16,
    /// The size of the block, header included.
    pub size: usize,
    /// The requested bytes. Zero when free.
    pub payload: usize,
    /// Is it a live allocation?
    pub used: bool,
    /// Where it was requested, if tracked.
    pub site: Option<AllocSite>,
}

impl BlockInfo {
    /// Snapshot a header.
    pub(crate) fn of(block: Pointer<Block>) -> BlockInfo {
        let header = unsafe { &**block };

        BlockInfo {
            addr: Block::payload_of(block) as usize,
            group: header.group(),
            page: header.page(),
            size: header.size(),
            payload: header.payload_size(),
            used: header.is_used(),
            site: header.site(),
        }
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[page {:2}] {:#014x} {} size {:>9}", self.page, self.addr,
               if self.used { "USED" } else { "FREE" }, self.size)?;

        if self.used {
            write!(f, " payload {:>9}", self.payload)?;
            if let Some(site) = self.site {
                write!(f, " ({})", site)?;
            }
        }

        Ok(())
    }
}

/// Totals of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// The id of the group.
    pub id: GroupId,
    /// The name of the group.
    pub name: &'static str,
    /// The size of its pages.
    pub page_size: usize,
    /// The number of pages.
    pub pages: usize,
    /// The number of live blocks.
    pub used_blocks: usize,
    /// The number of free blocks.
    pub free_blocks: usize,
    /// The bytes spanned by live blocks, headers included.
    pub used_bytes: usize,
    /// The bytes spanned by free blocks, headers included.
    pub free_bytes: usize,
    /// The bytes requested by the owners of live blocks.
    pub payload_bytes: usize,
}

impl GroupStats {
    /// Account for a block.
    pub fn add(&mut self, block: &BlockInfo) {
        if block.used {
            self.used_blocks += 1;
            self.used_bytes += block.size;
            self.payload_bytes += block.payload;
        } else {
            self.free_blocks += 1;
            self.free_bytes += block.size;
        }
    }

    /// The total number of blocks.
    pub fn blocks(&self) -> usize {
        self.used_blocks + self.free_blocks
    }
}

impl fmt::Display for GroupStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "total: {} block(s) in {} page(s), {} used ({} bytes, {} requested), {} free \
                   ({} bytes)",
               self.blocks(), self.pages, self.used_blocks, self.used_bytes, self.payload_bytes,
               self.free_blocks, self.free_bytes)
    }
}

/// The outcome of a leak audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeakReport {
    /// The number of live blocks.
    pub blocks: usize,
    /// The bytes requested by their owners.
    pub bytes: usize,
}

impl LeakReport {
    /// Account for a block, if it is live.
    pub fn add(&mut self, block: &BlockInfo) {
        if block.used {
            self.blocks += 1;
            self.bytes += block.payload;
        }
    }

    /// Is there nothing left?
    pub fn is_clean(&self) -> bool {
        self.blocks == 0
    }
}

/// Call counters and accumulated time of the allocation entry points.
#[derive(Default)]
pub struct Perf {
    allocs: AtomicU64,
    alloc_nanos: AtomicU64,
    frees: AtomicU64,
    free_nanos: AtomicU64,
}

impl Perf {
    /// Create zeroed counters.
    pub const fn new() -> Perf {
        Perf {
            allocs: AtomicU64::new(0),
            alloc_nanos: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            free_nanos: AtomicU64::new(0),
        }
    }

    /// Time an allocation until the guard drops.
    pub fn time_alloc(&self) -> Timer {
        Timer::new(&self.allocs, &self.alloc_nanos)
    }

    /// Time a free until the guard drops.
    pub fn time_free(&self) -> Timer {
        Timer::new(&self.frees, &self.free_nanos)
    }

    /// Take a snapshot.
    pub fn snapshot(&self) -> PerfStats {
        PerfStats {
            allocs: self.allocs.load(Ordering::Relaxed),
            alloc_nanos: self.alloc_nanos.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            free_nanos: self.free_nanos.load(Ordering::Relaxed),
        }
    }
}

/// A running measurement.
pub struct Timer<'a> {
    calls: &'a AtomicU64,
    nanos: &'a AtomicU64,
    start: Instant,
}

impl<'a> Timer<'a> {
    fn new(calls: &'a AtomicU64, nanos: &'a AtomicU64) -> Timer<'a> {
        Timer {
            calls,
            nanos,
            start: Instant::now(),
        }
    }

    /// Drop the measurement without recording it.
    pub fn discard(self) {
        std::mem::forget(self);
    }
}

impl<'a> Drop for Timer<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_nanos() as u64;

        self.calls.fetch_add(1, Ordering::Relaxed);
        self.nanos.fetch_add(elapsed, Ordering::Relaxed);
    }
}

/// A snapshot of the performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfStats {
    /// The number of allocations (realloc included).
    pub allocs: u64,
    /// Their accumulated time.
    pub alloc_nanos: u64,
    /// The number of frees.
    pub frees: u64,
    /// Their accumulated time.
    pub free_nanos: u64,
}

impl PerfStats {
    /// The mean time of an allocation in microseconds.
    pub fn mean_alloc_micros(&self) -> f64 {
        mean_micros(self.alloc_nanos, self.allocs)
    }

    /// The mean time of a free in microseconds.
    pub fn mean_free_micros(&self) -> f64 {
        mean_micros(self.free_nanos, self.frees)
    }
}

fn mean_micros(nanos: u64, calls: u64) -> f64 {
    if calls == 0 {
        0.0
    } else {
        nanos as f64 / calls as f64 / 1000.0
    }
}

impl fmt::Display for PerfStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "alloc: {} call(s), {:.3} us mean; free: {} call(s), {:.3} us mean",
               self.allocs, self.mean_alloc_micros(), self.frees, self.mean_free_micros())
    }
}

/// Print a leaked block to stderr.
pub(crate) fn report_leak(block: &BlockInfo) {
    let mut out = Writer::stderr();
    let _ = write!(out, "[LEAK] {} byte(s) at {:#x} in group {}", block.payload, block.addr,
                   block.group);
    if let Some(site) = block.site {
        let _ = write!(out, " ({})", site);
    }
    let _ = out.write_str("\n");
}

#[cfg(test)]
mod test {
    use super::*;

    fn block(used: bool, size: usize, payload: usize) -> BlockInfo {
        BlockInfo {
            addr: 0x1000,
            group: 0,
            page: 0,
            size,
            payload,
            used,
            site: Some(AllocSite::new("src/game.rs", 7)),
        }
    }

    #[test]
    fn test_group_totals() {
        let mut stats = GroupStats::default();
        stats.add(&block(true, 128, 40));
        stats.add(&block(false, 256, 0));
        stats.add(&block(true, 96, 16));

        assert_eq!(stats.blocks(), 3);
        assert_eq!(stats.used_blocks, 2);
        assert_eq!(stats.used_bytes, 224);
        assert_eq!(stats.payload_bytes, 56);
        assert_eq!(stats.free_bytes, 256);
    }

    #[test]
    fn test_leak_report() {
        let mut report = LeakReport::default();
        assert!(report.is_clean());

        report.add(&block(false, 256, 0));
        assert!(report.is_clean());

        report.add(&block(true, 128, 40));
        assert_eq!(report, LeakReport { blocks: 1, bytes: 40 });
    }

    #[test]
    fn test_block_display() {
        let line = block(true, 128, 40).to_string();

        assert!(line.contains("USED"));
        assert!(line.contains("payload        40"));
        assert!(line.ends_with("(src/game.rs:7)"));
        assert!(!block(false, 128, 0).to_string().contains("payload"));
    }

    #[test]
    fn test_perf() {
        let perf = Perf::new();
        drop(perf.time_alloc());
        drop(perf.time_alloc());
        drop(perf.time_free());

        let stats = perf.snapshot();
        assert_eq!(stats.allocs, 2);
        assert_eq!(stats.frees, 1);
        assert!(stats.mean_alloc_micros() >= 0.0);
        assert_eq!(PerfStats::default().mean_free_micros(), 0.0);
    }
}
