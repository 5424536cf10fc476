//! Capture configuration.
//!
//! Built either in code through the chained setters or deserialized from any
//! serde format; missing fields take their defaults.
//!
//! ```
//! use micro_reassembly::config::CaptureConfig;
//!
//! let config = CaptureConfig::new().output_dir("/tmp/bodies").hexdump(true);
//! assert!(config.persistence_dir().is_some());
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Where response bodies go. Empty disables persistence.
    output_dir: PathBuf,
    /// Log every decoded body as a hex dump.
    hexdump: bool,
    /// Chunks buffered per direction before the producer has to wait.
    feed_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::new(), hexdump: false, feed_capacity: DEFAULT_FEED_CAPACITY }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn hexdump(mut self, hexdump: bool) -> Self {
        self.hexdump = hexdump;
        self
    }

    pub fn feed_capacity(mut self, feed_capacity: usize) -> Self {
        self.feed_capacity = feed_capacity;
        self
    }

    /// The output directory, or `None` when persistence is off.
    pub fn persistence_dir(&self) -> Option<&Path> {
        if self.output_dir.as_os_str().is_empty() { None } else { Some(&self.output_dir) }
    }

    pub fn hexdump_enabled(&self) -> bool {
        self.hexdump
    }

    pub fn capacity(&self) -> usize {
        self.feed_capacity
    }
}
