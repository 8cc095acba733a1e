//! Intrusive free lists.

use std::marker::PhantomData;

use crate::block::Block;
use crate::ptr::Pointer;

/// A doubly linked list of free blocks, threaded through their `l_free`/`r_free` links.
///
/// Insertion is at the head, so the most recently freed block is found first.
pub struct FreeList {
    /// The first entry.
    head: Option<Pointer<Block>>,
    /// The number of entries.
    len: usize,
}

impl FreeList {
    /// Create an empty list.
    pub const fn new() -> FreeList {
        FreeList { head: None, len: 0 }
    }

    /// The first entry.
    #[inline]
    pub fn head(&self) -> Option<Pointer<Block>> {
        self.head
    }

    /// The number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the list empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Put a block at the head of the list.
    ///
    /// # Safety
    ///
    /// `block` must be a valid, free header which is on no list.
    pub unsafe fn push_front(&mut self, block: Pointer<Block>) {
        debug_assert!(!(**block).is_used(), "Pushing a used block to the free list.");

        (**block).l_free = None;
        (**block).r_free = self.head;
        if let Some(head) = self.head {
            (**head).l_free = Some(block);
        }

        self.head = Some(block);
        self.len += 1;
    }

    /// Take a block off the list, wherever it is.
    ///
    /// # Safety
    ///
    /// `block` must be on this list.
    pub unsafe fn unlink(&mut self, block: Pointer<Block>) {
        let left = (**block).l_free;
        let right = (**block).r_free;

        match left {
            Some(left) => (**left).r_free = right,
            None => {
                debug_assert!(self.head == Some(block), "Unlinking a block of another list.");
                self.head = right;
            }
        }
        if let Some(right) = right {
            (**right).l_free = left;
        }

        (**block).l_free = None;
        (**block).r_free = None;
        self.len -= 1;
    }

    /// Iterate over the entries, head first.
    pub fn iter(&self) -> Iter {
        Iter {
            cur: self.head,
            _list: PhantomData,
        }
    }
}

/// An iterator over a free list.
pub struct Iter<'a> {
    /// The next entry.
    cur: Option<Pointer<Block>>,
    /// The list is borrowed for the whole iteration.
    _list: PhantomData<&'a FreeList>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Pointer<Block>;

    fn next(&mut self) -> Option<Pointer<Block>> {
        let cur = self.cur?;
        self.cur = unsafe { (**cur).r_free };

        Some(cur)
    }
}
