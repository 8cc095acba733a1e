extern crate palloc;

mod util;

use palloc::{Error, GroupInfo, GENERAL, HEADER_SIZE};

#[test]
fn end_to_end() {
    let allocator = util::Small::with_bootstrap();
    assert!(allocator.start(1, 1024 * 1024));

    let ptr = allocator.alloc(64, 16, GENERAL);
    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % 16, 0);

    unsafe {
        allocator.free(ptr);
    }
    allocator.stop();
    assert!(!allocator.is_started());
}

#[test]
fn distinct_addresses() {
    let allocator = util::started(1, 64 * 1024);

    let a = allocator.alloc(64, 16, GENERAL);
    let b = allocator.alloc(64, 16, GENERAL);
    assert_ne!(a, b);

    unsafe {
        util::fill(a, 64, 1);
        util::fill(b, 64, 2);
        util::check(a, 64, 1);
        util::check(b, 64, 2);

        allocator.free(a);
        allocator.free(b);
    }

    assert!(allocator.audit().is_clean());
    allocator.stop();
}

#[test]
fn alignment() {
    let allocator = util::started(2, 64 * 1024);
    let mut ptrs = Vec::new();

    for &align in &[1, 2, 8, 16, 32, 64, 128, 512, 4096] {
        for &size in &[1, 7, 64, 200] {
            let ptr = allocator.alloc(size, align, GENERAL);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % align, 0, "{} bytes aligned to {}", size, align);

            unsafe {
                util::fill(ptr, size, align as u8);
            }
            ptrs.push((ptr, size, align));
        }
    }

    for (ptr, size, align) in ptrs {
        unsafe {
            util::check(ptr, size, align as u8);
            allocator.free(ptr);
        }
    }

    assert!(allocator.audit().is_clean());
    allocator.stop();
}

#[test]
fn reuse_is_lifo() {
    let allocator = util::started(1, 64 * 1024);

    let a = allocator.alloc(128, 16, GENERAL);
    let _fence = allocator.alloc(16, 16, GENERAL);
    let b = allocator.alloc(128, 16, GENERAL);
    let _fence2 = allocator.alloc(16, 16, GENERAL);

    unsafe {
        allocator.free(a);
        allocator.free(b);

        // The most recently freed block comes back first.
        assert_eq!(allocator.alloc(128, 16, GENERAL), b);
        assert_eq!(allocator.alloc(128, 16, GENERAL), a);

        allocator.free(a);
        allocator.free(b);
        allocator.free(_fence);
        allocator.free(_fence2);
    }

    allocator.stop();
}

#[test]
fn growth_adds_one_page() {
    let allocator = util::started(1, 4096);
    assert_eq!(allocator.group_stats(GENERAL).unwrap().pages, 1);

    let full = allocator.alloc(4096 - HEADER_SIZE, 16, GENERAL);
    assert!(!full.is_null());
    assert_eq!(allocator.group_stats(GENERAL).unwrap().pages, 1);

    let next = allocator.alloc(64, 16, GENERAL);
    assert!(!next.is_null());
    assert_eq!(allocator.group_stats(GENERAL).unwrap().pages, 2);

    unsafe {
        allocator.free(full);
        allocator.free(next);
    }
    allocator.stop();
}

#[test]
fn page_limit() {
    let allocator = util::started(1, 4096);
    let size = 4096 - HEADER_SIZE;
    let mut ptrs = Vec::new();

    loop {
        match allocator.try_alloc(size, 16, GENERAL) {
            Ok(ptr) => ptrs.push(ptr),
            Err(err) => {
                assert_eq!(err, Error::PagesExhausted(GENERAL));
                break;
            }
        }
    }

    assert_eq!(ptrs.len(), 64);
    assert!(allocator.alloc(size, 16, GENERAL).is_null());

    for ptr in ptrs {
        unsafe {
            allocator.free(ptr.as_ptr());
        }
    }
    allocator.stop();
}

#[test]
fn too_large() {
    let allocator = util::started(1, 4096);

    assert_eq!(allocator.try_alloc(4096, 16, GENERAL).unwrap_err(),
               Error::TooLarge { requested: 4096, page_size: 4096 });
    // No page was wasted on it.
    assert_eq!(allocator.group_stats(GENERAL).unwrap().pages, 1);

    allocator.stop();
}

#[test]
fn invalid_group() {
    let allocator = util::started(4, 4096);

    assert!(allocator.alloc(16, 16, 3).is_null());
    assert_eq!(allocator.try_alloc(16, 16, 3).unwrap_err(), Error::InvalidGroup(3));
    assert!(allocator.alloc(16, 16, palloc::INVALID_GROUP).is_null());

    let id = allocator.add_group(GroupInfo::new("Late", 4096));
    assert_eq!(id, 1);
    let ptr = allocator.alloc(16, 16, id);
    assert!(!ptr.is_null());

    unsafe {
        allocator.free(ptr);
    }
    allocator.stop();
}

#[test]
fn zero_sized() {
    let allocator = util::started(1, 4096);

    let a = allocator.alloc(0, 16, GENERAL);
    let b = allocator.alloc(0, 16, GENERAL);
    assert!(!a.is_null());
    assert!(!b.is_null());
    assert_ne!(a, b);

    unsafe {
        allocator.free(a);
        allocator.free(b);
    }
    allocator.stop();
}

#[test]
fn acid() {
    let allocator = util::started(1, 64 * 1024);

    util::acid_general(&allocator, || {
        util::acid_general(&allocator, || {
            let ptr = allocator.alloc(1000, 64, GENERAL);
            unsafe {
                util::fill(ptr, 1000, 9);
                util::check(ptr, 1000, 9);
                allocator.free(ptr);
            }
        });
    });

    assert!(allocator.audit().is_clean());
    allocator.stop();
}
