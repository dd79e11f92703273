//! Log fetcher with range bisection.
//!
//! Wraps an [`EngineGateway`]. When the backend refuses a range as too much
//! data, the range is split in half and each half retried, depth-first in
//! block order, down to single blocks. Any other error is returned as-is.

use std::sync::Arc;

use tracing::debug;

use crate::error::GatewayError;
use crate::source::EngineGateway;
use crate::types::{Address, BlockRef, RawLog};

pub struct LogFetcher {
    gateway: Arc<dyn EngineGateway>,
}

impl LogFetcher {
    pub fn new(gateway: Arc<dyn EngineGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve a block reference to its number.
    pub async fn block_number(&self, block: &BlockRef) -> Result<u64, GatewayError> {
        self.gateway.header_by_reference(block).await
    }

    /// Fetch all logs in `[from, to]` emitted by `addresses`.
    ///
    /// Logs are returned grouped by sub-range in ascending block order; within
    /// a sub-range, the backend's order is kept.
    pub async fn logs(
        &self,
        from: u64,
        to: u64,
        addresses: &[Address],
    ) -> Result<Vec<RawLog>, GatewayError> {
        if to < from {
            return Ok(vec![]);
        }
        // Stack of ranges still to fetch; the top is always the lowest range.
        let mut pending = vec![(from, to)];
        let mut all_logs = Vec::new();
        while let Some((start, end)) = pending.pop() {
            match self.gateway.get_logs(start, end, addresses).await {
                Ok(chunk) => all_logs.extend(chunk),
                Err(GatewayError::RangeTooLarge { message, .. }) if start < end => {
                    let mid = start + (end - start) / 2;
                    debug!(start, end, mid, %message, "log range too large, splitting");
                    pending.push((mid + 1, end));
                    pending.push((start, mid));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(all_logs)
    }
}
