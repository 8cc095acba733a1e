//! General error handling.

use thiserror::Error;

use crate::group::GroupId;

/// The result of a fallible allocator operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Allocator errors.
///
/// The sentinel entry points (`alloc`, `add_group`, ...) translate these into null pointers and
/// `INVALID_GROUP`; the `try_*` variants hand them out as is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `start` was called twice.
    #[error("Allocator already started")]
    AlreadyStarted,

    /// The operation needs a started allocator.
    #[error("Allocator not started")]
    NotStarted,

    /// Every group slot is taken.
    #[error("Group table full: at most {0} groups")]
    GroupsExhausted(usize),

    /// The group id does not name a live group.
    #[error("Invalid group id {0}")]
    InvalidGroup(GroupId),

    /// No group carries the looked up name.
    #[error("No group with the given name")]
    UnknownGroup,

    /// The group cannot grow any further.
    #[error("Group {0} reached its page limit")]
    PagesExhausted(GroupId),

    /// The system refused to hand out a page.
    #[error("The system is out of memory")]
    OutOfMemory,

    /// The bootstrap region cannot serve the request.
    #[error("Bootstrap region exhausted: requested {requested} bytes, {remaining} bytes left")]
    BootstrapExhausted {
        /// The requested size.
        requested: usize,
        /// The bytes left in the region.
        remaining: usize,
    },

    /// The request does not fit even an empty page.
    #[error("Request of {requested} bytes cannot fit a page of {page_size} bytes")]
    TooLarge {
        /// The requested size.
        requested: usize,
        /// The page size of the group.
        page_size: usize,
    },

    /// The alignment is not a power of two.
    #[error("Alignment {0} is not a power of two")]
    BadAlignment(usize),

    /// The page size is too small.
    #[error("Page size {0} cannot hold a single block")]
    BadPageSize(usize),

    /// The canary of the block is broken.
    #[error("Memory corruption detected at 0x{0:x}")]
    Corrupted(usize),

    /// The block is already free.
    #[error("Double free of 0x{0:x}")]
    DoubleFree(usize),
}

#[cfg(test)]
mod test {
    use super::*;

    use std::fmt::Write;

    use crate::write::BufWriter;

    #[test]
    fn test_display() {
        let mut buf = [0u8; 64];
        let mut writer = BufWriter::new(&mut buf);
        write!(writer, "{}", Error::Corrupted(0x1f0)).unwrap();
        let len = 64 - writer.remaining();

        assert_eq!(&buf[..len], b"Memory corruption detected at 0x1f0");
    }
}
