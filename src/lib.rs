//! **Palloc:** a group-partitioned, page-based allocator.
//!
//! Memory is organized in groups: named pools of large pages, each with its own lock, so unrelated
//! subsystems never contend or fragment each other. Every block carries an intrusive header with a
//! canary, and free blocks are coalesced with their physical neighbours on release. At shutdown
//! every group is audited, and leaked blocks are reported and treated as fatal.
//!
//! Requests made before the allocator is started are served from a bootstrap region, which makes
//! it usable as the global allocator from the first allocation of the process.

#![warn(missing_docs)]

#[macro_use]
mod write;
#[macro_use]
pub mod log;

mod allocator;
mod block;
mod bootstrap;
pub mod config;
mod error;
mod fail;
mod freelist;
mod group;
mod page;
mod ptr;
mod registry;
mod stats;
mod sys;
mod vec;

pub use allocator::{Allocator, InGroup};
pub use block::{AllocSite, HEADER_SIZE};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use fail::{default_leak_handler, LeakHandler};
pub use group::{GroupId, GroupInfo, GENERAL, INVALID_GROUP};
pub use stats::{BlockInfo, GroupStats, LeakReport, PerfStats};
