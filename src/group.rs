//! Allocation groups.
//!
//! A group is a named pool of pages sharing a page size and a lock. Allocations in different groups
//! never contend.

use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::block::{self, AllocSite, Block, HEADER_SIZE};
use crate::config::{GRANULE, MAX_PAGES_PER_GROUP};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::ptr::Pointer;
use crate::stats::{BlockInfo, GroupStats};
use crate::vec::FixedVec;

/// The id of a group: its index in the registry.
pub type GroupId = u16;

/// The id returned when a group cannot be created or found.
pub const INVALID_GROUP: GroupId = 0xFFFF;

/// The id of the group created by `start`.
pub const GENERAL: GroupId = 0;

/// The description of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    /// The name, used for lookups and diagnostics.
    pub name: &'static str,
    /// The size of every page of the group.
    pub page_size: usize,
}

impl GroupInfo {
    /// Describe a group.
    pub const fn new(name: &'static str, page_size: usize) -> GroupInfo {
        GroupInfo { name, page_size }
    }

    /// Check the page size, rounding it down to the block granularity.
    pub fn validated(self) -> Result<GroupInfo> {
        let page_size = self.page_size & !(GRANULE - 1);
        if page_size < block::MIN_BLOCK {
            return Err(Error::BadPageSize(self.page_size));
        }

        Ok(GroupInfo { page_size, ..self })
    }
}

/// Lock a mutex, ignoring poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A group slot.
///
/// Slots are created empty for the whole registry up front; a slot becomes a live group when its
/// `info` is set.
pub struct Group {
    /// The index of this slot.
    id: GroupId,
    /// The description, set once the group is live.
    info: OnceLock<GroupInfo>,
    /// The pages, in creation order.
    pages: Mutex<FixedVec<Page>>,
}

impl Group {
    /// Create an empty slot.
    pub fn slot(id: GroupId) -> Option<Group> {
        Some(Group {
            id,
            info: OnceLock::new(),
            pages: Mutex::new(FixedVec::with_capacity(MAX_PAGES_PER_GROUP)?),
        })
    }

    /// The id of this group.
    #[inline]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The description, if live.
    #[inline]
    pub fn info(&self) -> Option<&GroupInfo> {
        self.info.get()
    }

    /// Bring the slot to life.
    ///
    /// Returns `false` if it already is.
    pub fn activate(&self, info: GroupInfo) -> bool {
        self.info.set(info).is_ok()
    }

    /// The number of pages.
    pub fn page_count(&self) -> usize {
        lock(&self.pages).len()
    }

    /// Make sure the group has at least one page.
    pub fn reserve_first_page(&self) -> Result<()> {
        let info = *self.info().ok_or(Error::InvalidGroup(self.id))?;
        let mut pages = lock(&self.pages);

        if pages.is_empty() {
            self.grow(&mut pages, &info)?;
        }

        Ok(())
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// The pages are searched first-fit in creation order. If none of them can take the request,
    /// one page is appended and tried.
    pub fn alloc(&self, size: usize, align: usize, site: Option<AllocSite>) -> Result<Pointer<u8>> {
        let info = *self.info().ok_or(Error::InvalidGroup(self.id))?;
        let too_large = Error::TooLarge {
            requested: size,
            page_size: info.page_size,
        };

        // Not even an empty page would do.
        match block::block_size(size) {
            Some(need) if need <= info.page_size => (),
            _ => return Err(too_large),
        }

        let mut pages = lock(&self.pages);

        for page in pages.iter_mut() {
            if let Some((block, fit)) = page.find_fit(size, align) {
                return Ok(unsafe { page.carve(block, fit, size, site) });
            }
        }

        let page = self.grow(&mut pages, &info)?;
        match page.find_fit(size, align) {
            Some((block, fit)) => Ok(unsafe { page.carve(block, fit, size, site) }),
            // Only the alignment lead can make a fresh page too small.
            None => Err(too_large),
        }
    }

    /// Append a page.
    fn grow<'a>(&self, pages: &'a mut FixedVec<Page>, info: &GroupInfo) -> Result<&'a mut Page> {
        if pages.is_full() {
            log!(Warning, "Group {} (`{}`) reached its limit of {} pages.", self.id, info.name,
                 MAX_PAGES_PER_GROUP);
            return Err(Error::PagesExhausted(self.id));
        }

        let id = pages.len() as u16;
        let page = Page::create(self.id, id, info.page_size).ok_or(Error::OutOfMemory)?;
        trace!("Group {} grew page {} of {} bytes at {:#x}.", self.id, id, info.page_size,
               page.start());

        if pages.push(page).is_err() {
            return Err(Error::PagesExhausted(self.id));
        }
        let last = pages.len() - 1;

        Ok(&mut pages[last])
    }

    /// Look up the page owning a block and run `f` on both, under the lock.
    ///
    /// The header is validated against the page first.
    fn with_block<F, T>(&self, block: Pointer<Block>, f: F) -> Result<T>
        where F: FnOnce(&mut Page, Pointer<Block>) -> Result<T> {
        let mut pages = lock(&self.pages);

        let index = unsafe { (**block).page() } as usize;
        let page = match pages.get_mut(index) {
            Some(page) if page.id() as usize == index
                && page.contains(block.addr())
                && page.contains(block.addr() + HEADER_SIZE - 1) => page,
            _ => return Err(Error::Corrupted(Block::payload_of(block) as usize)),
        };

        f(page, block)
    }

    /// Free a block of this group.
    pub fn free(&self, block: Pointer<Block>) -> Result<()> {
        self.with_block(block, |page, block| unsafe {
            if !(**block).is_used() {
                return Err(Error::DoubleFree(Block::payload_of(block) as usize));
            }

            page.release(block);
            Ok(())
        })
    }

    /// Resize a block of this group without moving it.
    ///
    /// Returns whether it succeeded.
    pub fn resize_in_place(&self, block: Pointer<Block>, size: usize,
                           site: Option<AllocSite>) -> Result<bool> {
        self.with_block(block, |page, block| unsafe {
            if !(**block).is_used() {
                return Err(Error::DoubleFree(Block::payload_of(block) as usize));
            }

            Ok(page.resize_in_place(block, size, site))
        })
    }

    /// Visit every block of every page, in page then address order, under the lock.
    pub fn for_each_block<F: FnMut(&BlockInfo)>(&self, mut f: F) {
        let pages = lock(&self.pages);

        for page in pages.iter() {
            for block in page.blocks() {
                f(&BlockInfo::of(block));
            }
        }
    }

    /// Summarize the group.
    pub fn stats(&self) -> GroupStats {
        let info = self.info().copied();
        let mut stats = GroupStats {
            id: self.id,
            name: info.map_or("", |info| info.name),
            page_size: info.map_or(0, |info| info.page_size),
            pages: self.page_count(),
            ..GroupStats::default()
        };

        self.for_each_block(|block| stats.add(block));

        stats
    }

    /// Give every page back to the system.
    pub fn clear(&self) {
        lock(&self.pages).clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn group(page_size: usize) -> Group {
        let group = Group::slot(1).unwrap();
        assert!(group.activate(GroupInfo::new("Test", page_size)));
        group
    }

    #[test]
    fn test_validated() {
        assert_eq!(GroupInfo::new("a", 4100).validated(), Ok(GroupInfo::new("a", 4096)));
        assert_eq!(GroupInfo::new("a", 16).validated(), Err(Error::BadPageSize(16)));
    }

    #[test]
    fn test_activate_once() {
        let group = Group::slot(3).unwrap();
        assert!(group.info().is_none());
        assert!(group.alloc(8, 16, None).is_err());

        assert!(group.activate(GroupInfo::new("A", 4096)));
        assert!(!group.activate(GroupInfo::new("B", 4096)));
        assert_eq!(group.info().unwrap().name, "A");
    }

    #[test]
    fn test_grows_one_page_at_a_time() {
        let group = group(4096);

        let a = group.alloc(4096 - HEADER_SIZE, 16, None).unwrap();
        assert_eq!(group.page_count(), 1);

        let b = group.alloc(64, 16, None).unwrap();
        assert_eq!(group.page_count(), 2);

        unsafe {
            group.free(Block::from_payload(*a)).unwrap();
            group.free(Block::from_payload(*b)).unwrap();
        }
        assert_eq!(group.page_count(), 2);
    }

    #[test]
    fn test_too_large() {
        let group = group(4096);

        assert_eq!(group.alloc(4096, 16, None),
                   Err(Error::TooLarge { requested: 4096, page_size: 4096 }));
        assert_eq!(group.page_count(), 0);
    }

    #[test]
    fn test_page_limit() {
        let group = group(4096);
        let size = 4096 - HEADER_SIZE;

        for _ in 0..MAX_PAGES_PER_GROUP {
            group.alloc(size, 16, None).unwrap();
        }

        assert_eq!(group.alloc(size, 16, None), Err(Error::PagesExhausted(1)));
        assert_eq!(group.page_count(), MAX_PAGES_PER_GROUP);
    }

    #[test]
    fn test_double_free() {
        let group = group(4096);
        let a = group.alloc(64, 16, None).unwrap();
        let _b = group.alloc(64, 16, None).unwrap();

        unsafe {
            let block = Block::from_payload(*a);
            group.free(block).unwrap();
            assert_eq!(group.free(block), Err(Error::DoubleFree(a.addr())));
        }
    }

    #[test]
    fn test_stats() {
        let group = group(4096);
        let _a = group.alloc(100, 16, None).unwrap();
        let _b = group.alloc(10, 16, None).unwrap();

        let stats = group.stats();
        assert_eq!(stats.name, "Test");
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.used_blocks, 2);
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.payload_bytes, 110);
        assert_eq!(stats.used_bytes + stats.free_bytes, 4096);
    }
}
