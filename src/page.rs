//! Pages.
//!
//! A page is one large buffer obtained from the system, carved into blocks. It owns both the
//! physical chain of its blocks and the free list threading the free ones.

use std::marker::PhantomData;

use crate::block::{self, AllocSite, Block, Fit, HEADER_SIZE};
use crate::config::{GRANULE, SPLIT_SLACK};
use crate::freelist::FreeList;
use crate::group::GroupId;
use crate::ptr::Pointer;
use crate::sys;

/// A page of a group.
pub struct Page {
    /// The index of this page within its group.
    id: u16,
    /// The buffer.
    memory: Pointer<u8>,
    /// The size of the buffer.
    size: usize,
    /// The free blocks.
    free: FreeList,
}

impl Page {
    /// Obtain a page of `size` bytes from the system.
    ///
    /// The page starts out as a single free block. Returns `None` if the system is out of memory.
    pub fn create(group: GroupId, id: u16, size: usize) -> Option<Page> {
        debug_assert!(size % GRANULE == 0 && size >= block::MIN_BLOCK, "Malformed page size.");

        let memory = sys::alloc(size, GRANULE)?;
        let mut page = Page {
            id,
            memory,
            size,
            free: FreeList::new(),
        };

        unsafe {
            let first = Block::write(*memory, size, group, id);
            page.free.push_front(first);
        }

        Some(page)
    }

    /// The index of this page within its group.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The size of the buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The start of the buffer.
    #[inline]
    pub fn start(&self) -> usize {
        self.memory.addr()
    }

    /// Does the buffer contain `addr`?
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start() && addr < self.start() + self.size
    }

    /// The free list.
    #[inline]
    pub fn free_list(&self) -> &FreeList {
        &self.free
    }

    /// Iterate over the blocks of the page in address order.
    pub fn blocks(&self) -> Blocks {
        Blocks {
            cur: Some(self.memory.cast()),
            _page: PhantomData,
        }
    }

    /// Find the first free block which can take the request.
    pub fn find_fit(&self, size: usize, align: usize) -> Option<(Pointer<Block>, Fit)> {
        self.free.iter().find_map(|candidate| {
            let avail = unsafe { (**candidate).size() };

            block::fit(candidate.addr(), avail, size, align).map(|fit| (candidate, fit))
        })
    }

    /// Hand out `size` bytes of `block` as placed by `fit`.
    ///
    /// The lead (if any) and a large enough tail are split off and pushed back to the free list.
    /// Returns the payload pointer.
    ///
    /// # Safety
    ///
    /// `block` and `fit` must come from `find_fit` on this page, with no mutation in between.
    pub unsafe fn carve(&mut self, mut block: Pointer<Block>, fit: Fit, size: usize,
                        site: Option<AllocSite>) -> Pointer<u8> {
        self.free.unlink(block);

        if fit.lead > 0 {
            let rest = Block::split(block, fit.lead);
            self.free.push_front(block);
            block = rest;
        }

        // Used first, so the split tail cannot merge back into it.
        (**block).set_used(size, site);
        self.trim(block, fit.span);

        Pointer::new(Block::payload_of(block))
    }

    /// Take a used block back, coalescing it with its free neighbours.
    ///
    /// # Safety
    ///
    /// `block` must be a valid, used header of this page.
    pub unsafe fn release(&mut self, block: Pointer<Block>) {
        debug_assert!((**block).is_used(), "Releasing a free block.");

        (**block).set_free();
        self.insert_free(block);
    }

    /// Resize a used block without moving its payload.
    ///
    /// Shrinking always succeeds. Growing succeeds if the physically next block is free and large
    /// enough, in which case it is absorbed. Surplus space is split off either way. Returns whether
    /// the block now holds `size` bytes.
    ///
    /// # Safety
    ///
    /// `block` must be a valid, used header of this page.
    pub unsafe fn resize_in_place(&mut self, block: Pointer<Block>, size: usize,
                                  site: Option<AllocSite>) -> bool {
        let need = match block::block_size(size) {
            Some(need) => need,
            None => return false,
        };

        if need > (**block).size() {
            let next = match (**block).next() {
                Some(next) if !(**next).is_used() => next,
                _ => return false,
            };
            if (**block).size() + (**next).size() < need {
                return false;
            }

            self.free.unlink(next);
            Block::absorb_next(block);
        }

        self.trim(block, need);
        (**block).set_used(size, site);

        true
    }

    /// Split off everything of `block` beyond `span` bytes, if the remainder is worth a block.
    ///
    /// The remainder is coalesced with a free successor and pushed to the free list.
    unsafe fn trim(&mut self, block: Pointer<Block>, span: usize) {
        let remaining = (**block).size() - span;

        if remaining > HEADER_SIZE + SPLIT_SLACK {
            let rest = Block::split(block, span);
            self.insert_free(rest);
        }
    }

    /// Push a free block, which is on no list, merging it with free neighbours first.
    unsafe fn insert_free(&mut self, mut block: Pointer<Block>) {
        if let Some(next) = (**block).next() {
            if !(**next).is_used() {
                self.free.unlink(next);
                Block::absorb_next(block);
            }
        }

        if let Some(prev) = (**block).prev() {
            if !(**prev).is_used() {
                self.free.unlink(prev);
                Block::absorb_next(prev);
                block = prev;
            }
        }

        self.free.push_front(block);
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        unsafe {
            sys::free(self.memory);
        }
    }
}

/// An iterator over the physical chain of a page.
pub struct Blocks<'a> {
    /// The next block.
    cur: Option<Pointer<Block>>,
    /// The page is borrowed for the whole iteration.
    _page: PhantomData<&'a Page>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Pointer<Block>;

    fn next(&mut self) -> Option<Pointer<Block>> {
        let cur = self.cur?;
        self.cur = unsafe { (**cur).next() };

        Some(cur)
    }
}
