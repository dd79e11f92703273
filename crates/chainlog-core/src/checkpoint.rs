//! Checkpoint store contract.
//!
//! A checkpoint records how far a downstream consumer has taken values out
//! of a cache: `(block_number, log_index)` of the last consumed log, per
//! signature. The processor only reads checkpoints; consumers write them
//! through [`CheckpointWriter`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::types::Signature;

/// Position of the last log a downstream consumer has taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub block_number: u64,
    pub log_index: u64,
}

impl CheckpointRecord {
    pub const fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

/// Read side of the checkpoint store, as consumed by the processor.
///
/// A signature without a record reads as `(0, 0)`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Both halves of the record, read atomically.
    async fn record(&self, signature: &Signature) -> Result<CheckpointRecord, CheckpointError>;

    async fn last_processed_block(&self, signature: &Signature) -> Result<u64, CheckpointError> {
        Ok(self.record(signature).await?.block_number)
    }

    async fn last_processed_log_index(
        &self,
        signature: &Signature,
    ) -> Result<u64, CheckpointError> {
        Ok(self.record(signature).await?.log_index)
    }
}

/// Write side of the checkpoint store, used by downstream consumers.
#[async_trait]
pub trait CheckpointWriter: Send + Sync {
    /// Save (upsert) the record for `signature`.
    async fn save(
        &self,
        signature: &Signature,
        record: CheckpointRecord,
    ) -> Result<(), CheckpointError>;

    /// Delete the record for `signature` (e.g. when resetting a consumer).
    async fn delete(&self, signature: &Signature) -> Result<(), CheckpointError>;
}
