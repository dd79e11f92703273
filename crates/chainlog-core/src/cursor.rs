//! Cache cursor: tracks how far a cache has processed the chain.

use serde::{Deserialize, Serialize};

use crate::types::RawLog;

/// A cache's position in the chain.
///
/// The cursor knows:
/// - Which block was last completely processed (the watermark)
/// - An optional resume hint `(block, index)`: logs at or before it were
///   already consumed downstream and must not be delivered again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Every log at or before this block has been pushed into the cache.
    pub last_processed_block: u64,
    /// Block of the resume hint, if any.
    pub current_processing_block: Option<u64>,
    /// Last consumed log index within `current_processing_block`.
    pub current_processing_index: Option<u64>,
}

impl Cursor {
    /// Create a cursor at the given watermark with no resume hint.
    pub fn new(last_processed_block: u64) -> Self {
        Self {
            last_processed_block,
            ..Default::default()
        }
    }

    /// Returns `true` if `log` has not been processed yet and is not covered
    /// by the resume hint.
    pub fn admits(&self, log: &RawLog) -> bool {
        if log.block_number <= self.last_processed_block {
            return false;
        }
        match self.current_processing_block {
            Some(block) if log.block_number < block => false,
            Some(block) if log.block_number == block => match self.current_processing_index {
                Some(index) => log.log_index > index,
                None => true,
            },
            _ => true,
        }
    }
}
