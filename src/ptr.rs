//! Pointer wrappers.

use std::ptr::NonNull;
use std::{fmt, ops};

/// A pointer wrapper type.
///
/// A wrapper around a raw non-null `*mut T`. Block headers link to each other through these; the
/// referent is owned by the page the header lives in.
pub struct Pointer<T> {
    /// The internal pointer.
    ptr: NonNull<T>,
}

impl<T> Pointer<T> {
    /// Create a new `Pointer` from a raw pointer.
    ///
    /// # Safety
    ///
    /// This function is unsafe since a null pointer can cause UB, due to `Pointer` being
    /// non-nullable.
    #[inline]
    pub unsafe fn new(ptr: *mut T) -> Pointer<T> {
        debug_assert!(!ptr.is_null(), "Null pointer!");

        Pointer {
            ptr: NonNull::new_unchecked(ptr),
        }
    }

    /// Create a `Pointer` from a raw pointer, returning `None` on null.
    #[inline]
    pub fn from_raw(ptr: *mut T) -> Option<Pointer<T>> {
        NonNull::new(ptr).map(|ptr| Pointer { ptr })
    }

    /// Cast this pointer into a pointer to another type.
    ///
    /// This will simply reinterpret the pointer, leaving the actual data unmodified.
    #[inline]
    pub fn cast<U>(self) -> Pointer<U> {
        Pointer {
            ptr: self.ptr.cast(),
        }
    }

    /// Convert into a `NonNull`.
    #[inline]
    pub fn into_non_null(self) -> NonNull<T> {
        self.ptr
    }

    /// The address of the referent.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Is this pointer aligned to `align`?
    #[inline]
    pub fn aligned_to(&self, align: usize) -> bool {
        self.addr() % align == 0
    }
}

impl<T> Clone for Pointer<T> {
    #[inline]
    fn clone(&self) -> Pointer<T> {
        *self
    }
}

impl<T> Copy for Pointer<T> {}

impl<T> PartialEq for Pointer<T> {
    #[inline]
    fn eq(&self, other: &Pointer<T>) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Pointer<T> {}

impl<T> fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

unsafe impl<T: Send> Send for Pointer<T> {}
unsafe impl<T: Sync> Sync for Pointer<T> {}

impl<T> ops::Deref for Pointer<T> {
    type Target = *mut T;

    #[inline]
    fn deref(&self) -> &*mut T {
        // `NonNull<T>` is a transparent wrapper around `*const T`.
        unsafe { &*(&self.ptr as *const NonNull<T> as *const *mut T) }
    }
}
