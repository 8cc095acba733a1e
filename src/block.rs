//! Block headers.
//!
//! Every region of a page, live or free, starts with a `Block` header, and the payload handed to
//! the user begins right after it. The headers of a page form a doubly linked chain in address
//! order (`next`/`prev`) which covers the page without gaps; free blocks are additionally threaded
//! onto the page's free list (`l_free`/`r_free`).

use std::panic::Location;
use std::{fmt, mem, ptr};

use crate::config::{CANARY, GRANULE};
use crate::group::GroupId;
use crate::ptr::Pointer;

/// The size of a block header.
///
/// This is a multiple of `GRANULE`, so payloads directly behind a header keep the alignment of the
/// header.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// The smallest block which can exist on its own: a header and one granule.
pub const MIN_BLOCK: usize = HEADER_SIZE + GRANULE;

/// The place an allocation was requested from.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocSite {
    /// The source file.
    file: &'static str,
    /// The line in `file`.
    line: u32,
}

impl AllocSite {
    /// Create a site from its parts.
    pub const fn new(file: &'static str, line: u32) -> AllocSite {
        AllocSite { file, line }
    }

    /// The site of the caller.
    ///
    /// With `#[track_caller]` propagated, this is the first caller outside of the chain.
    #[track_caller]
    pub fn caller() -> AllocSite {
        let location = Location::caller();

        AllocSite {
            file: location.file(),
            line: location.line(),
        }
    }

    /// The source file.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// The line.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl fmt::Debug for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A block header.
///
/// # Invariants
///
/// 1. `size >= HEADER_SIZE`, and for a used block `size >= HEADER_SIZE + payload`.
/// 2. The address and the size are multiples of `GRANULE`.
/// 3. `next` starts exactly `size` bytes after this header, and its `prev` points back here.
/// 4. Used blocks are never on the free list.
#[repr(C, align(16))]
pub struct Block {
    /// Equal to `CANARY` for every header handed out by the allocator.
    canary: u32,
    /// Is the block a live allocation?
    used: bool,
    /// The owning group.
    group: GroupId,
    /// The index of the owning page within its group.
    page: u16,
    /// The size of the block, header included.
    size: usize,
    /// The number of bytes requested by the owner. Zero when free.
    payload: usize,
    /// The physically next block.
    next: Option<Pointer<Block>>,
    /// The physically previous block.
    prev: Option<Pointer<Block>>,
    /// The previous entry of the free list.
    pub(crate) l_free: Option<Pointer<Block>>,
    /// The next entry of the free list.
    pub(crate) r_free: Option<Pointer<Block>>,
    /// Where the block was requested.
    #[cfg(any(debug_assertions, feature = "debug_tools"))]
    site: Option<AllocSite>,
}

impl Block {
    /// Write a free header spanning `size` bytes at `at`.
    ///
    /// The new block is linked to nothing.
    ///
    /// # Safety
    ///
    /// `at` must be valid for `size` bytes and aligned to `GRANULE`.
    pub unsafe fn write(at: *mut u8, size: usize, group: GroupId, page: u16) -> Pointer<Block> {
        debug_assert!(at as usize % GRANULE == 0, "Unaligned block header.");
        debug_assert!(size >= HEADER_SIZE && size % GRANULE == 0, "Malformed block size.");

        let block = at as *mut Block;
        ptr::write(block, Block {
            canary: CANARY,
            used: false,
            group,
            page,
            size,
            payload: 0,
            next: None,
            prev: None,
            l_free: None,
            r_free: None,
            #[cfg(any(debug_assertions, feature = "debug_tools"))]
            site: None,
        });

        Pointer::new(block)
    }

    /// Get the header of a payload pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned as a payload, or the header bytes must at least be readable.
    #[inline]
    pub unsafe fn from_payload(ptr: *mut u8) -> Pointer<Block> {
        Pointer::new(ptr.sub(HEADER_SIZE) as *mut Block)
    }

    /// The payload pointer of a block.
    #[inline]
    pub fn payload_of(block: Pointer<Block>) -> *mut u8 {
        (*block as *mut u8).wrapping_add(HEADER_SIZE)
    }

    /// Does the canary hold?
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.canary == CANARY
    }

    /// Is this a live allocation?
    #[inline]
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// The size of the block, header included.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The bytes the owner requested.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload
    }

    /// The bytes usable behind the header.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size - HEADER_SIZE
    }

    /// The owning group.
    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// The index of the owning page.
    #[inline]
    pub fn page(&self) -> u16 {
        self.page
    }

    /// The physically next block.
    #[inline]
    pub fn next(&self) -> Option<Pointer<Block>> {
        self.next
    }

    /// The physically previous block.
    #[inline]
    pub fn prev(&self) -> Option<Pointer<Block>> {
        self.prev
    }

    /// Where the block was requested, if tracked.
    #[inline]
    pub fn site(&self) -> Option<AllocSite> {
        #[cfg(any(debug_assertions, feature = "debug_tools"))]
        return self.site;

        #[cfg(not(any(debug_assertions, feature = "debug_tools")))]
        None
    }

    /// Hand the block out.
    pub fn set_used(&mut self, payload: usize, site: Option<AllocSite>) {
        debug_assert!(payload <= self.capacity(), "Payload exceeds the block.");

        self.used = true;
        self.payload = payload;
        self.set_site(site);
    }

    /// Take the block back.
    pub fn set_free(&mut self) {
        self.used = false;
        self.payload = 0;
        self.set_site(None);
    }

    /// Record the site of the latest (re)allocation.
    #[inline]
    pub fn set_site(&mut self, _site: Option<AllocSite>) {
        #[cfg(any(debug_assertions, feature = "debug_tools"))]
        {
            self.site = _site;
        }
    }

    /// Split the block `offset` bytes in.
    ///
    /// The front keeps the header of `block`; the tail becomes a new free block which is linked
    /// physically but not into any free list. The tail is returned.
    ///
    /// # Safety
    ///
    /// `block` must be a valid header, `offset` a multiple of `GRANULE`, and both halves must be
    /// able to hold a header.
    pub unsafe fn split(block: Pointer<Block>, offset: usize) -> Pointer<Block> {
        let head = &mut **block;

        debug_assert!(offset % GRANULE == 0, "Unaligned split.");
        debug_assert!(offset >= HEADER_SIZE && head.size - offset >= HEADER_SIZE,
                      "Split leaves a block without room for its header.");

        let tail = Block::write((*block as *mut u8).add(offset), head.size - offset, head.group,
                                head.page);
        (**tail).prev = Some(block);
        (**tail).next = head.next;
        if let Some(next) = head.next {
            (**next).prev = Some(tail);
        }

        head.next = Some(tail);
        head.size = offset;

        tail
    }

    /// Merge the physically next block into `block`.
    ///
    /// The absorbed header loses its canary. It must already be off the free list.
    ///
    /// # Safety
    ///
    /// `block` must be a valid header.
    pub unsafe fn absorb_next(block: Pointer<Block>) {
        let head = &mut **block;
        let next = match head.next {
            Some(next) => next,
            None => return,
        };
        let absorbed = &mut **next;

        debug_assert!(block.addr() + head.size == next.addr(), "Blocks are not adjacent.");
        debug_assert!(absorbed.l_free.is_none() && absorbed.r_free.is_none(),
                      "Absorbing a block which is still on a free list.");

        head.size += absorbed.size;
        head.next = absorbed.next;
        if let Some(after) = absorbed.next {
            (**after).prev = Some(block);
        }

        absorbed.canary = 0;
    }
}

/// The placement of a request inside a free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fit {
    /// Bytes in front of the new header which stay free as their own block.
    pub lead: usize,
    /// The size of the new block, header included.
    pub span: usize,
}

/// Round `n` up to a multiple of `align`, which must be a power of two.
#[inline]
pub fn align_up(n: usize, align: usize) -> Option<usize> {
    n.checked_add(align - 1).map(|n| n & !(align - 1))
}

/// The size of a block holding `size` bytes of payload.
#[inline]
pub fn block_size(size: usize) -> Option<usize> {
    align_up(size, GRANULE)?.checked_add(HEADER_SIZE)
}

/// Place `size` bytes aligned to `align` in the free block at `start` of `avail` bytes.
///
/// The header always sits right in front of the payload. If aligning the payload opens a gap in
/// front of the header, the gap is grown to at least `MIN_BLOCK` bytes so it can remain a block of
/// its own.
pub fn fit(start: usize, avail: usize, size: usize, align: usize) -> Option<Fit> {
    let span = block_size(size)?;

    let mut payload = align_up(start.checked_add(HEADER_SIZE)?, align)?;
    let mut lead = payload - HEADER_SIZE - start;
    if lead != 0 && lead < MIN_BLOCK {
        payload = align_up(start.checked_add(HEADER_SIZE + MIN_BLOCK)?, align)?;
        lead = payload - HEADER_SIZE - start;
    }

    if lead.checked_add(span)? <= avail {
        Some(Fit { lead, span })
    } else {
        None
    }
}
