//! The allocator as the global allocator of the test process.
//!
//! This runs without the test harness, since the harness keeps allocations alive across the
//! allocator's lifetime.

extern crate palloc;

use std::alloc::Layout;
use std::collections::BTreeMap;

use palloc::{Allocator, GroupInfo, GENERAL};

#[global_allocator]
static ALLOCATOR: Allocator = Allocator::new();

fn collections() {
    let mut numbers: Vec<u64> = (0..1000).collect();
    numbers.extend(1000..5000);
    assert_eq!(numbers.iter().sum::<u64>(), 4999 * 5000 / 2);

    let mut text = String::new();
    for n in 0..200 {
        text.push_str(&n.to_string());
    }
    assert!(text.starts_with("0123456789101112"));

    let mut map = BTreeMap::new();
    for n in 0..500u32 {
        map.insert(n, Box::new([n; 16]));
    }
    assert_eq!(map[&321][15], 321);

    let stats = ALLOCATOR.group_stats(GENERAL).unwrap();
    assert!(stats.used_blocks > 500);
}

fn groups() {
    let id = ALLOCATOR.add_group(GroupInfo::new("Scratch", 64 * 1024));
    let scratch = ALLOCATOR.in_group(id);

    let layout = Layout::from_size_align(4096, 64).unwrap();
    let ptrs: [_; 4] = std::array::from_fn(|_| scratch.allocate(layout));
    assert_eq!(ALLOCATOR.group_stats(id).unwrap().used_blocks, 4);

    for ptr in ptrs {
        unsafe {
            scratch.deallocate(ptr);
        }
    }
}

fn main() {
    // The runtime's own setup was served by the bootstrap region.
    let bootstrap = ALLOCATOR.bootstrap_used();
    assert!(ALLOCATOR.start(8, 1024 * 1024));

    collections();
    groups();

    assert!(ALLOCATOR.audit().is_clean());
    ALLOCATOR.stop();
    assert!(!ALLOCATOR.is_started());

    // Back to the bootstrap region.
    let late = vec![1u8; 64];
    assert!(ALLOCATOR.bootstrap_used() >= bootstrap + 64);
    drop(late);

    println!("global: ok");
}
