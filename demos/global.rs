//! Run the allocator as the global allocator of a small program, with its groups, its log and its
//! statistics.

extern crate palloc;

use std::alloc::Layout;

use palloc::log::{Level, Output};
use palloc::{Allocator, EngineConfig, GroupInfo};

#[global_allocator]
static ALLOCATOR: Allocator = Allocator::new();

fn main() {
    let config = EngineConfig::default()
        .max_groups(4)
        .page_size(1024 * 1024)
        .log_level(Level::Info)
        .log_output(Output::TERMINAL);

    if !ALLOCATOR.begin(&config) {
        return;
    }

    let particles = ALLOCATOR.add_group(GroupInfo::new("Particles", 256 * 1024));
    let view = ALLOCATOR.in_group(particles);
    let layout = Layout::from_size_align(3 * 1024, 64).unwrap();

    let blocks: Vec<_> = (0..8).map(|_| view.allocate(layout)).collect();
    let names: Vec<String> = (0..16).map(|n| format!("entity #{}", n)).collect();

    ALLOCATOR.print_stats();

    drop(names);
    for block in blocks {
        unsafe {
            view.deallocate(block);
        }
    }

    // Prints the statistics once more, audits every group and stops.
    ALLOCATOR.end();

    println!("Done: {}", ALLOCATOR.perf_stats());
}
