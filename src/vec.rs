//! Vector primitive.

use std::mem::{self, size_of};
use std::{ops, ptr, slice};

use crate::ptr::Pointer;
use crate::sys;

/// A low-level, fixed-capacity vector primitive.
///
/// The buffer is obtained from the system directly and never reallocated, so elements have stable
/// addresses and the vector can be used to hold the allocator's own tables.
pub struct FixedVec<T> {
    /// A pointer to the start of the buffer.
    ptr: Pointer<T>,
    /// The capacity of the buffer.
    cap: usize,
    /// The length of the vector.
    ///
    /// This is the number of elements from the start, that is initialized, and can be read safely.
    len: usize,
}

impl<T> FixedVec<T> {
    /// Create an empty vector with room for `cap` elements.
    ///
    /// Returns `None` if the system is out of memory.
    pub fn with_capacity(cap: usize) -> Option<FixedVec<T>> {
        let bytes = cap.checked_mul(size_of::<T>())?.max(1);
        let ptr = sys::alloc(bytes, mem::align_of::<T>())?;

        Some(FixedVec {
            ptr: ptr.cast(),
            cap,
            len: 0,
        })
    }

    /// Get the capacity of this vector.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Is there no room left?
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.cap
    }

    /// Push an element to the end of this vector.
    ///
    /// On failure (not enough capacity), the element is handed back.
    #[inline]
    pub fn push(&mut self, elem: T) -> Result<(), T> {
        if self.is_full() {
            Err(elem)
        } else {
            // Place the element in the end of the vector.
            unsafe {
                ptr::write((*self.ptr).add(self.len), elem);
            }

            self.len += 1;
            Ok(())
        }
    }

    /// Drop every element, keeping the buffer.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;

        unsafe {
            ptr::drop_in_place(slice::from_raw_parts_mut(*self.ptr, len));
        }
    }
}

impl<T> ops::Deref for FixedVec<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        unsafe { slice::from_raw_parts(*self.ptr as *const T, self.len) }
    }
}

impl<T> ops::DerefMut for FixedVec<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(*self.ptr, self.len) }
    }
}

impl<T> Drop for FixedVec<T> {
    fn drop(&mut self) {
        self.clear();

        unsafe {
            sys::free(self.ptr.cast());
        }
    }
}

unsafe impl<T: Send> Send for FixedVec<T> {}
unsafe impl<T: Sync> Sync for FixedVec<T> {}
