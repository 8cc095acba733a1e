//! Configuration.
//!
//! This module contains anything which can be tweaked and customized to the users preferences.

use crate::log::{Level, Output};

/// The maximal number of pages a single group may own.
pub const MAX_PAGES_PER_GROUP: usize = 64;

/// The sentinel stored in every block header produced by this allocator.
pub const CANARY: u32 = 0x5041_4C43;

/// The slack which must remain after a fit before the tail is split off.
///
/// A block is split when the remainder exceeds the header size plus this value.
pub const SPLIT_SLACK: usize = 32;

/// The granularity of block sizes and addresses.
pub const GRANULE: usize = 16;

/// The minimal alignment of every payload.
pub const DEFAULT_ALIGN: usize = 16;

/// The size of the bootstrap region used before the allocator is started.
pub const BOOTSTRAP_SIZE: usize = 1024 * 1024;

/// The default maximal number of groups.
pub const DEFAULT_MAX_GROUPS: usize = 64;

/// The default page size.
pub const DEFAULT_PAGE_SIZE: usize = 16 * 1024 * 1024;

/// The size of the stack buffer a single log line is formatted into.
pub const LOG_BUFFER_SIZE: usize = 512;

/// The default log file.
pub const DEFAULT_LOG_FILE: &str = "logs/palloc.log";

/// Are allocation sites and performance counters tracked?
pub const DEBUG_TOOLS: bool = cfg!(any(debug_assertions, feature = "debug_tools"));

/// The name of the group created by `start`.
pub const GENERAL_GROUP_NAME: &str = "General";

/// Engine-level configuration.
///
/// This is handed to `Allocator::begin`, which starts the allocator and the log sink in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The maximal number of groups.
    pub max_groups: usize,
    /// The page size of the general group.
    pub page_size: usize,
    /// The minimal level of messages which are logged.
    pub log_level: Level,
    /// The targets of the log.
    pub log_output: Output,
    /// The file the log is appended to, if `Output::FILE` is set.
    pub log_file: &'static str,
}

impl EngineConfig {
    /// Set the maximal number of groups.
    pub fn max_groups(mut self, max_groups: usize) -> EngineConfig {
        self.max_groups = max_groups;
        self
    }

    /// Set the page size of the general group.
    pub fn page_size(mut self, page_size: usize) -> EngineConfig {
        self.page_size = page_size;
        self
    }

    /// Set the minimal log level.
    pub fn log_level(mut self, level: Level) -> EngineConfig {
        self.log_level = level;
        self
    }

    /// Set the log targets.
    pub fn log_output(mut self, output: Output) -> EngineConfig {
        self.log_output = output;
        self
    }

    /// Set the log file.
    pub fn log_file(mut self, file: &'static str) -> EngineConfig {
        self.log_file = file;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            max_groups: DEFAULT_MAX_GROUPS,
            page_size: DEFAULT_PAGE_SIZE,
            log_level: Level::Verbose,
            log_output: Output::ALL,
            log_file: DEFAULT_LOG_FILE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.max_groups, 64);
        assert_eq!(config.page_size, 16 * 1024 * 1024);
        assert_eq!(config.log_level, Level::Verbose);
        assert_eq!(config.log_output, Output::ALL);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .max_groups(4)
            .page_size(4096)
            .log_output(Output::TERMINAL)
            .log_level(Level::Error);

        assert_eq!(config.max_groups, 4);
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.log_output, Output::TERMINAL);
        assert_eq!(config.log_level, Level::Error);
    }
}
