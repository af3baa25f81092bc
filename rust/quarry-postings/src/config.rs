//! Writer and reader configuration.

use quarry_common::{Result, verify_arg};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SKIP_INTERVAL: u32 = 16;

pub const DEFAULT_MAX_SKIP_LEVELS: u32 = 10;

pub const DEFAULT_TERMS_BLOCK_SIZE: usize = 32;

/// Parameters of the postings encoding chosen at write time.
///
/// `skip_interval`, `max_skip_levels` and `skip_minimum` are persisted in the terms
/// dictionary; readers always decode with the persisted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingsConfig {
    /// Number of documents between two level-0 skip entries. Also the fan-out
    /// between consecutive skip levels.
    pub skip_interval: u32,
    /// Upper bound on the number of skip levels.
    pub max_skip_levels: u32,
    /// Terms with fewer documents than this carry no skip data.
    pub skip_minimum: u32,
    /// Number of terms per terms dictionary block.
    pub terms_block_size: usize,
}

impl PostingsConfig {
    pub fn with_skip_interval(mut self, skip_interval: u32) -> Self {
        self.skip_interval = skip_interval;
        self
    }

    pub fn with_max_skip_levels(mut self, max_skip_levels: u32) -> Self {
        self.max_skip_levels = max_skip_levels;
        self
    }

    pub fn with_skip_minimum(mut self, skip_minimum: u32) -> Self {
        self.skip_minimum = skip_minimum;
        self
    }

    pub fn with_terms_block_size(mut self, terms_block_size: usize) -> Self {
        self.terms_block_size = terms_block_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(skip_interval, self.skip_interval >= 2);
        verify_arg!(
            max_skip_levels,
            (1..=32).contains(&self.max_skip_levels)
        );
        verify_arg!(skip_minimum, self.skip_minimum >= 1);
        verify_arg!(terms_block_size, self.terms_block_size >= 2);
        Ok(())
    }
}

impl Default for PostingsConfig {
    fn default() -> Self {
        PostingsConfig {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            max_skip_levels: DEFAULT_MAX_SKIP_LEVELS,
            skip_minimum: DEFAULT_SKIP_INTERVAL,
            terms_block_size: DEFAULT_TERMS_BLOCK_SIZE,
        }
    }
}

/// Options applied when opening a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Recompute the checksum of every segment file while opening it.
    pub verify_checksums_on_open: bool,
    /// Let postings cursors jump through the skip lists on `advance`. When off,
    /// `advance` decodes every posting up to the target.
    pub use_skip_data: bool,
}

impl ReaderConfig {
    pub fn with_checksums_on_open(mut self, verify: bool) -> Self {
        self.verify_checksums_on_open = verify;
        self
    }

    pub fn with_skip_data(mut self, use_skip_data: bool) -> Self {
        self.use_skip_data = use_skip_data;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            verify_checksums_on_open: false,
            use_skip_data: true,
        }
    }
}
