//! The allocator.
//!
//! An `Allocator` is the context every operation goes through. It owns the bootstrap region, the
//! group registry (published through an atomic pointer once started), the leak handler and the
//! performance counters.

use std::alloc::{self, GlobalAlloc, Layout};
use std::fmt::Write;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;
use std::mem;

use crate::block::{AllocSite, Block, HEADER_SIZE};
use crate::bootstrap::Bootstrap;
use crate::config::{self, EngineConfig, BOOTSTRAP_SIZE, DEFAULT_ALIGN, GENERAL_GROUP_NAME,
                    GRANULE};
use crate::error::{Error, Result};
use crate::fail::{self, LeakHandler};
use crate::group::{self, Group, GroupId, GroupInfo, GENERAL, INVALID_GROUP};
use crate::log::{self, Level};
use crate::ptr::Pointer;
use crate::registry::Registry;
use crate::stats::{self, BlockInfo, GroupStats, LeakReport, Perf, PerfStats, Timer};
use crate::sys;
use crate::write::Writer;

/// A group-partitioned, page-based allocator.
///
/// Before `start`, requests are served from a bootstrap region of `BOOTSTRAP` bytes. After it,
/// every request goes to a group: a set of pages with its own lock. `stop` audits every group and
/// refuses to tear down while anything is still allocated.
///
/// The allocator can be installed as the global allocator, in which case the process' allocations
/// go to the general group:
///
/// ```no_run
/// #[global_allocator]
/// static ALLOCATOR: palloc::Allocator = palloc::Allocator::new();
///
/// fn main() {
///     ALLOCATOR.start(16, 1024 * 1024);
///     let v = vec![1, 2, 3];
///     drop(v);
///     ALLOCATOR.stop();
/// }
/// ```
pub struct Allocator<const BOOTSTRAP: usize = { BOOTSTRAP_SIZE }> {
    /// The registry, or null before `start` and after `stop`.
    registry: AtomicPtr<Registry>,
    /// The region serving requests while there is no registry.
    bootstrap: Bootstrap<BOOTSTRAP>,
    /// Serializes `start` and `stop`.
    lifecycle: Mutex<()>,
    /// Called by `stop` when it finds leaks.
    leak_handler: Mutex<LeakHandler>,
    /// The performance counters.
    perf: Perf,
}

impl Allocator {
    /// Create an allocator with the default bootstrap region.
    pub const fn new() -> Allocator {
        Allocator::with_bootstrap()
    }
}

impl Default for Allocator {
    fn default() -> Allocator {
        Allocator::new()
    }
}

impl<const BOOTSTRAP: usize> Allocator<BOOTSTRAP> {
    /// Create an allocator with a bootstrap region of `BOOTSTRAP` bytes.
    pub const fn with_bootstrap() -> Allocator<BOOTSTRAP> {
        Allocator {
            registry: AtomicPtr::new(ptr::null_mut()),
            bootstrap: Bootstrap::new(),
            lifecycle: Mutex::new(()),
            leak_handler: Mutex::new(fail::default_leak_handler as LeakHandler),
            perf: Perf::new(),
        }
    }

    /// Get the registry, if started.
    #[inline]
    fn registry(&self) -> Option<&Registry> {
        let registry = self.registry.load(Ordering::Acquire);

        if registry.is_null() {
            None
        } else {
            Some(unsafe { &*registry })
        }
    }

    /// Is the allocator started?
    pub fn is_started(&self) -> bool {
        self.registry().is_some()
    }

    /// Start the allocator.
    ///
    /// This creates room for `max_groups` groups and the general group (id 0) with pages of
    /// `page_size` bytes. Returns `false` if the allocator is already started or cannot start.
    pub fn start(&self, max_groups: usize, page_size: usize) -> bool {
        match self.try_start(max_groups, page_size) {
            Ok(()) => true,
            Err(err) => {
                log!(Error, "Cannot start the allocator: {}.", err);
                false
            }
        }
    }

    /// Start the allocator.
    pub fn try_start(&self, max_groups: usize, page_size: usize) -> Result<()> {
        let _guard = group::lock(&self.lifecycle);

        if self.is_started() {
            return Err(Error::AlreadyStarted);
        }

        let general = GroupInfo::new(GENERAL_GROUP_NAME, page_size).validated()?;
        let registry = Registry::new(max_groups)?;
        let memory = sys::alloc(mem::size_of::<Registry>(), mem::align_of::<Registry>())
            .ok_or(Error::OutOfMemory)?;
        let registry = unsafe {
            let slot = memory.cast::<Registry>();
            ptr::write(*slot, registry);
            slot
        };

        // The general group exists before anyone can see the registry.
        if let Err(err) = unsafe { (**registry).add(general) } {
            unsafe {
                destroy(registry);
            }
            return Err(err);
        }

        self.registry.store(*registry, Ordering::Release);
        log!(Info, "Started with {} group slot(s) and general pages of {} bytes ({} bootstrap \
                    byte(s) used).", max_groups, general.page_size, self.bootstrap.used());

        Ok(())
    }

    /// Start the log sink and the allocator as configured.
    ///
    /// Returns whether the allocator started. Failing to open the log file is not fatal.
    pub fn begin(&self, config: &EngineConfig) -> bool {
        if !log::init(config.log_level, config.log_output, config.log_file) {
            log!(Warning, "Cannot open the log file `{}`. Logging to the terminal only.",
                 config.log_file);
        }

        self.start(config.max_groups, config.page_size)
    }

    /// Stop the allocator, then the log sink.
    pub fn end(&self) {
        self.stop();
        log::terminate();
    }

    /// Stop the allocator.
    ///
    /// Every group is audited. Each live block is reported, and if there are any the leak handler
    /// is called, which by default halts the process. Otherwise all pages go back to the system,
    /// and subsequent requests are served by the bootstrap region again.
    ///
    /// No other thread may use the allocator concurrently.
    pub fn stop(&self) {
        let _guard = group::lock(&self.lifecycle);

        let registry = match self.registry() {
            Some(registry) => registry,
            None => {
                log!(Warning, "Stopping an allocator which is not started.");
                return;
            }
        };

        if log::enabled(Level::Info) {
            self.print_stats();
        }

        let report = audit(registry, true);
        if !report.is_clean() {
            let handler = *group::lock(&self.leak_handler);
            handler(report);
        }

        let registry = self.registry.swap(ptr::null_mut(), Ordering::AcqRel);
        if let Some(registry) = Pointer::from_raw(registry) {
            unsafe {
                destroy(registry);
            }
        }

        log!(Info, "Stopped.");
    }

    /// Replace the leak handler.
    pub fn set_leak_handler(&self, handler: LeakHandler) {
        *group::lock(&self.leak_handler) = handler;
    }

    /// Add a group.
    ///
    /// Returns `INVALID_GROUP` if the allocator is not started or all group slots are taken.
    pub fn add_group(&self, info: GroupInfo) -> GroupId {
        match self.try_add_group(info) {
            Ok(id) => id,
            Err(err) => {
                log!(Error, "Cannot add group `{}`: {}.", info.name, err);
                INVALID_GROUP
            }
        }
    }

    /// Add a group.
    pub fn try_add_group(&self, info: GroupInfo) -> Result<GroupId> {
        self.registry().ok_or(Error::NotStarted)?.add(info)
    }

    /// Find a group by name.
    ///
    /// Returns `INVALID_GROUP` if there is none.
    pub fn lookup_group_id_by_name(&self, name: &str) -> GroupId {
        match self.try_lookup_group(name) {
            Ok(id) => id,
            Err(err) => {
                log!(Error, "Cannot find group `{}`: {}.", name, err);
                INVALID_GROUP
            }
        }
    }

    /// Find a group by name.
    pub fn try_lookup_group(&self, name: &str) -> Result<GroupId> {
        self.registry().ok_or(Error::NotStarted)?.lookup(name)
    }

    /// The number of groups.
    pub fn group_count(&self) -> usize {
        self.registry().map_or(0, Registry::len)
    }

    /// Allocate `size` bytes aligned to `align` in `group`.
    ///
    /// Returns null on failure. The caller is recorded as the allocation site.
    #[track_caller]
    pub fn alloc(&self, size: usize, align: usize, group: GroupId) -> *mut u8 {
        self.alloc_at(size, align, group, AllocSite::caller())
    }

    /// Allocate `size` bytes aligned to `align` in `group`, recording `site`.
    pub fn alloc_at(&self, size: usize, align: usize, group: GroupId, site: AllocSite) -> *mut u8 {
        match self.alloc_inner(size, align, group, Some(site)) {
            Ok(ptr) => *ptr,
            Err(err) => {
                log!(Error, "Allocation of {} bytes in group {} failed: {}.", size, group, err);
                ptr::null_mut()
            }
        }
    }

    /// Allocate `size` bytes aligned to `align` in `group`.
    #[track_caller]
    pub fn try_alloc(&self, size: usize, align: usize, group: GroupId) -> Result<NonNull<u8>> {
        self.alloc_inner(size, align, group, Some(AllocSite::caller()))
            .map(Pointer::into_non_null)
    }

    fn alloc_inner(&self, size: usize, align: usize, group: GroupId,
                   site: Option<AllocSite>) -> Result<Pointer<u8>> {
        if !align.is_power_of_two() {
            return Err(Error::BadAlignment(align));
        }

        let registry = match self.registry() {
            Some(registry) => registry,
            None => {
                let ptr = self.bootstrap.alloc(size, align)?;
                trace!("Bootstrap alloc of {} bytes at {:?}.", size, ptr);
                return Ok(ptr);
            }
        };

        let _timer = self.time_alloc();
        let ptr = registry.get(group)?.alloc(size, align.max(DEFAULT_ALIGN), site)?;
        trace!("Alloc of {} bytes (align {}) in group {} at {:?}.", size, align, group, ptr);

        Ok(ptr)
    }

    /// Free an allocation.
    ///
    /// Null and bootstrap pointers are ignored. A pointer with a broken canary or a block which
    /// is already free halts the process in debug builds and is logged and ignored otherwise.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this allocator, and must not be used afterwards.
    pub unsafe fn free(&self, ptr: *mut u8) {
        if let Err(err) = self.try_free(ptr) {
            fail::bad_pointer("Freeing", ptr, err);
        }
    }

    /// Free an allocation.
    ///
    /// Unlike `free`, refused pointers are reported to the caller only.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this allocator, and must not be used afterwards. The header
    /// bytes in front of `ptr` are read to validate it.
    pub unsafe fn try_free(&self, ptr: *mut u8) -> Result<()> {
        if ptr.is_null() || self.bootstrap.contains(ptr as usize) {
            return Ok(());
        }

        let registry = self.registry().ok_or(Error::NotStarted)?;
        let block = header_of(ptr)?;
        let group = owner(registry, block)?;

        let _timer = self.time_free();
        group.free(block)?;
        trace!("Free of {:p} in group {}.", ptr, group.id());

        Ok(())
    }

    /// Resize an allocation to `new_size` bytes.
    ///
    /// A null `ptr` allocates in the general group; a `new_size` of zero frees and returns null.
    /// The block is grown in place when its successor is free and large enough, and shrunk in
    /// place always; otherwise the contents move to a new block of the same group. On failure,
    /// null is returned and `ptr` stays valid.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this allocator.
    #[track_caller]
    pub unsafe fn realloc(&self, ptr: *mut u8, new_size: usize, align: usize) -> *mut u8 {
        self.realloc_at(ptr, new_size, align, AllocSite::caller())
    }

    /// Resize an allocation to `new_size` bytes, recording `site`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this allocator.
    pub unsafe fn realloc_at(&self, ptr: *mut u8, new_size: usize, align: usize,
                             site: AllocSite) -> *mut u8 {
        match self.realloc_inner(ptr, new_size, align, None, Some(site)) {
            Ok(new) => new.map_or(ptr::null_mut(), |new| *new),
            Err(err) => realloc_failed(ptr, new_size, err),
        }
    }

    /// Resize an allocation to `new_size` bytes.
    ///
    /// Returns `None` if `new_size` is zero and the allocation was freed.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this allocator.
    #[track_caller]
    pub unsafe fn try_realloc(&self, ptr: *mut u8, new_size: usize,
                              align: usize) -> Result<Option<NonNull<u8>>> {
        self.realloc_inner(ptr, new_size, align, None, Some(AllocSite::caller()))
            .map(|new| new.map(Pointer::into_non_null))
    }

    /// Resize an allocation.
    ///
    /// `old_size` bounds the bytes moved out of the bootstrap region, when known.
    unsafe fn realloc_inner(&self, ptr: *mut u8, new_size: usize, align: usize,
                            old_size: Option<usize>,
                            site: Option<AllocSite>) -> Result<Option<Pointer<u8>>> {
        if !align.is_power_of_two() {
            return Err(Error::BadAlignment(align));
        }
        if ptr.is_null() {
            return self.alloc_inner(new_size, align, GENERAL, site).map(Some);
        }
        if new_size == 0 {
            self.try_free(ptr)?;
            return Ok(None);
        }

        if self.bootstrap.contains(ptr as usize) {
            let new = self.alloc_inner(new_size, align, GENERAL, site)?;

            let mut len = old_size.unwrap_or_else(|| self.bootstrap.remaining_from(ptr as usize));
            if old_size.is_none() && new.addr() > ptr as usize && self.bootstrap.contains(new.addr()) {
                // The old allocation ends before the new one starts.
                len = len.min(new.addr() - ptr as usize);
            }
            ptr::copy(ptr, *new, len.min(new_size));
            trace!("Moved {:p} out of the bootstrap region to {:?}.", ptr, new);

            return Ok(Some(new));
        }

        let registry = self.registry().ok_or(Error::NotStarted)?;
        let block = header_of(ptr)?;
        let group = owner(registry, block)?;
        let old_payload = (**block).payload_size();

        if ptr as usize % align == 0 {
            let timer = self.time_alloc();
            if group.resize_in_place(block, new_size, site)? {
                trace!("Resized {:p} in place from {} to {} bytes.", ptr, old_payload, new_size);
                return Ok(Some(Pointer::new(ptr)));
            }
            if let Some(timer) = timer {
                timer.discard();
            }
        }

        let new = self.alloc_inner(new_size, align, group.id(), site)?;
        ptr::copy_nonoverlapping(ptr, *new, old_payload.min(new_size));
        {
            let _timer = self.time_free();
            group.free(block)?;
        }
        trace!("Moved {:p} to {:?} ({} to {} bytes).", ptr, new, old_payload, new_size);

        Ok(Some(new))
    }

    /// Print every block of every group, the totals of each group, and the performance counters
    /// to stdout.
    pub fn print_stats(&self) {
        let mut out = Writer::stdout();

        let registry = match self.registry() {
            Some(registry) => registry,
            None => {
                let _ = writeln!(out, "Allocator not started ({} of {} bootstrap byte(s) used).",
                                 self.bootstrap.used(), BOOTSTRAP);
                return;
            }
        };

        let _ = writeln!(out, "========== Memory: {} group(s) ==========", registry.len());
        for group in registry.live() {
            let mut stats = GroupStats::default();
            if let Some(info) = group.info() {
                let _ = writeln!(out, "Group {} `{}` (pages of {} bytes):", group.id(), info.name,
                                 info.page_size);
            }

            group.for_each_block(|block| {
                let _ = writeln!(out, "  {}", block);
                stats.add(block);
            });
            stats.pages = group.page_count();

            let _ = writeln!(out, "  {}", stats);
        }

        let _ = writeln!(out, "Bootstrap: {} of {} byte(s) used.", self.bootstrap.used(),
                         BOOTSTRAP);
        if config::DEBUG_TOOLS {
            let _ = writeln!(out, "Performance: {}", self.perf.snapshot());
        }
    }

    /// The totals of a group, if it exists.
    pub fn group_stats(&self, group: GroupId) -> Option<GroupStats> {
        self.registry()?.get(group).ok().map(Group::stats)
    }

    /// Visit every block of a group in page and address order.
    ///
    /// The group is locked during the walk, so `f` must not allocate from it.
    pub fn for_each_block<F: FnMut(&BlockInfo)>(&self, group: GroupId, f: F) -> Result<()> {
        self.registry().ok_or(Error::NotStarted)?.get(group)?.for_each_block(f);

        Ok(())
    }

    /// Count the live blocks of every group, without acting on them.
    pub fn audit(&self) -> LeakReport {
        self.registry().map_or_else(LeakReport::default, |registry| audit(registry, false))
    }

    /// The performance counters.
    ///
    /// These only move in debug builds or with the `debug_tools` feature.
    pub fn perf_stats(&self) -> PerfStats {
        self.perf.snapshot()
    }

    /// The bytes handed out by the bootstrap region, padding included.
    pub fn bootstrap_used(&self) -> usize {
        self.bootstrap.used()
    }

    /// A `GlobalAlloc` view which allocates from one group.
    pub fn in_group(&self, group: GroupId) -> InGroup<'_, BOOTSTRAP> {
        InGroup {
            allocator: self,
            group,
        }
    }

    #[inline]
    fn time_alloc(&self) -> Option<Timer> {
        if config::DEBUG_TOOLS {
            Some(self.perf.time_alloc())
        } else {
            None
        }
    }

    #[inline]
    fn time_free(&self) -> Option<Timer> {
        if config::DEBUG_TOOLS {
            Some(self.perf.time_free())
        } else {
            None
        }
    }

    /// Back a `GlobalAlloc::realloc`.
    unsafe fn layout_realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        match self.realloc_inner(ptr, new_size, layout.align(), Some(layout.size()), None) {
            Ok(new) => new.map_or(ptr::null_mut(), |new| *new),
            Err(err) => realloc_failed(ptr, new_size, err),
        }
    }
}

impl<const BOOTSTRAP: usize> Drop for Allocator<BOOTSTRAP> {
    fn drop(&mut self) {
        if let Some(registry) = Pointer::from_raw(*self.registry.get_mut()) {
            unsafe {
                destroy(registry);
            }
        }
    }
}

unsafe impl<const BOOTSTRAP: usize> GlobalAlloc for Allocator<BOOTSTRAP> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.alloc_inner(layout.size(), layout.align(), GENERAL, None) {
            Ok(ptr) => *ptr,
            Err(err) => {
                log!(Error, "Allocation of {} bytes failed: {}.", layout.size(), err);
                ptr::null_mut()
            }
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.layout_realloc(ptr, layout, new_size)
    }
}

/// An allocator bound to one group.
///
/// Requests through this view go to its group; releases and reallocations go to the group owning
/// the block, which for blocks obtained through the view is the same.
#[derive(Clone, Copy)]
pub struct InGroup<'a, const BOOTSTRAP: usize = { BOOTSTRAP_SIZE }> {
    /// The allocator.
    allocator: &'a Allocator<BOOTSTRAP>,
    /// The group.
    group: GroupId,
}

impl<'a, const BOOTSTRAP: usize> InGroup<'a, BOOTSTRAP> {
    /// The group of this view.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Allocate for `layout`, diverting to `handle_alloc_error` on failure.
    #[track_caller]
    pub fn allocate(&self, layout: Layout) -> NonNull<u8> {
        match self.allocator.try_alloc(layout.size(), layout.align(), self.group) {
            Ok(ptr) => ptr,
            Err(_) => alloc::handle_alloc_error(layout),
        }
    }

    /// Free an allocation of this view.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this view and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        self.allocator.free(ptr.as_ptr());
    }
}

unsafe impl<'a, const BOOTSTRAP: usize> GlobalAlloc for InGroup<'a, BOOTSTRAP> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.allocator.alloc_inner(layout.size(), layout.align(), self.group, None) {
            Ok(ptr) => *ptr,
            Err(err) => {
                log!(Error, "Allocation of {} bytes in group {} failed: {}.", layout.size(),
                     self.group, err);
                ptr::null_mut()
            }
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.allocator.free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.allocator.layout_realloc(ptr, layout, new_size)
    }
}

/// Report a failed reallocation. The old pointer stays valid.
#[cold]
fn realloc_failed(ptr: *mut u8, new_size: usize, err: Error) -> *mut u8 {
    match err {
        Error::Corrupted(_) | Error::DoubleFree(_) => fail::bad_pointer("Reallocating", ptr, err),
        _ => log!(Error, "Reallocation of {:p} to {} bytes failed: {}.", ptr, new_size, err),
    }

    ptr::null_mut()
}

/// Get and validate the header of a payload pointer.
unsafe fn header_of(ptr: *mut u8) -> Result<Pointer<Block>> {
    let addr = ptr as usize;
    if addr % GRANULE != 0 || addr < HEADER_SIZE {
        return Err(Error::Corrupted(addr));
    }

    let block = Block::from_payload(ptr);
    if !(**block).is_valid() {
        return Err(Error::Corrupted(addr));
    }

    Ok(block)
}

/// Get the group owning a validated header.
unsafe fn owner(registry: &Registry, block: Pointer<Block>) -> Result<&Group> {
    registry.get((**block).group())
        .map_err(|_| Error::Corrupted(Block::payload_of(block) as usize))
}

/// Count the live blocks of every group, optionally reporting each.
fn audit(registry: &Registry, report_each: bool) -> LeakReport {
    let mut report = LeakReport::default();

    for group in registry.live() {
        group.for_each_block(|block| {
            if block.used {
                report.add(block);
                if report_each {
                    stats::report_leak(block);
                }
            }
        });
    }

    report
}

/// Tear a registry down.
unsafe fn destroy(registry: Pointer<Registry>) {
    ptr::drop_in_place(*registry);
    sys::free(registry.cast());
}

#[cfg(test)]
mod test {
    use super::*;

    type Small = Allocator<4096>;

    #[test]
    fn test_bootstrap_before_start() {
        let allocator = Small::with_bootstrap();

        let ptr = allocator.alloc(100, 16, GENERAL);
        assert!(!ptr.is_null());
        assert!(allocator.bootstrap.contains(ptr as usize));
        assert!(allocator.bootstrap_used() >= 100);

        unsafe {
            // Ignored.
            allocator.free(ptr);
            assert_eq!(allocator.try_free(ptr), Ok(()));
        }
    }

    #[test]
    fn test_start_twice() {
        let allocator = Small::with_bootstrap();

        assert!(allocator.start(4, 4096));
        assert!(!allocator.start(4, 4096));
        assert_eq!(allocator.try_start(4, 4096), Err(Error::AlreadyStarted));
        assert_eq!(allocator.group_count(), 1);

        allocator.stop();
        assert!(!allocator.is_started());
    }

    #[test]
    fn test_restart() {
        let allocator = Small::with_bootstrap();

        assert!(allocator.start(4, 4096));
        allocator.stop();
        assert!(allocator.start(2, 8192));
        assert_eq!(allocator.group_stats(GENERAL).unwrap().page_size, 8192);
        allocator.stop();
    }

    #[test]
    fn test_bad_alignment() {
        let allocator = Small::with_bootstrap();
        allocator.start(4, 4096);

        assert_eq!(allocator.try_alloc(8, 3, GENERAL), Err(Error::BadAlignment(3)));
        assert!(allocator.alloc(8, 0, GENERAL).is_null());

        allocator.stop();
    }

    #[test]
    fn test_bootstrap_realloc_moves_into_group() {
        let allocator = Small::with_bootstrap();

        let old = allocator.alloc(8, 8, GENERAL);
        unsafe {
            ptr::copy_nonoverlapping(b"bootstr!".as_ptr(), old, 8);
        }
        allocator.start(4, 4096);

        unsafe {
            let new = allocator.realloc(old, 64, 16);
            assert!(!allocator.bootstrap.contains(new as usize));
            assert_eq!(std::slice::from_raw_parts(new, 8), b"bootstr!");
            allocator.free(new);
        }

        allocator.stop();
    }

    #[test]
    fn test_bootstrap_realloc_before_start() {
        let allocator = Small::with_bootstrap();

        let old = allocator.alloc(4, 4, GENERAL);
        unsafe {
            ptr::copy_nonoverlapping(b"abcd".as_ptr(), old, 4);

            let new = allocator.realloc(old, 32, 16);
            assert!(allocator.bootstrap.contains(new as usize));
            assert_eq!(std::slice::from_raw_parts(new, 4), b"abcd");
        }
    }

    #[test]
    fn test_global_alloc_interface() {
        let allocator = Small::with_bootstrap();
        allocator.start(2, 64 * 1024);

        unsafe {
            let layout = Layout::from_size_align(48, 64).unwrap();
            let ptr = GlobalAlloc::alloc(&allocator, layout);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % 64, 0);
            ptr::write_bytes(ptr, 0x5A, 48);

            let ptr = GlobalAlloc::realloc(&allocator, ptr, layout, 4000);
            assert_eq!(*ptr.add(47), 0x5A);

            GlobalAlloc::dealloc(&allocator, ptr, Layout::from_size_align(4000, 64).unwrap());
        }

        assert!(allocator.audit().is_clean());
        allocator.stop();
    }

    #[test]
    fn test_drop_releases_registry() {
        let allocator = Small::with_bootstrap();
        allocator.start(2, 4096);
        let _leaked = allocator.alloc(64, 16, GENERAL);

        // No audit on drop.
        drop(allocator);
    }
}
