//! In-memory checkpoint store.
//!
//! All data is lost when the process exits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use chainlog_core::checkpoint::{CheckpointRecord, CheckpointStore, CheckpointWriter};
use chainlog_core::error::CheckpointError;
use chainlog_core::types::Signature;

/// In-memory checkpoint store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    records: Mutex<HashMap<Signature, CheckpointRecord>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<Signature, CheckpointRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of signatures with a record.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn record(&self, signature: &Signature) -> Result<CheckpointRecord, CheckpointError> {
        Ok(self.records().get(signature).copied().unwrap_or_default())
    }
}

#[async_trait]
impl CheckpointWriter for InMemoryCheckpointStore {
    async fn save(
        &self,
        signature: &Signature,
        record: CheckpointRecord,
    ) -> Result<(), CheckpointError> {
        debug!(
            %signature,
            block = record.block_number,
            index = record.log_index,
            "checkpoint saved"
        );
        self.records().insert(*signature, record);
        Ok(())
    }

    async fn delete(&self, signature: &Signature) -> Result<(), CheckpointError> {
        self.records().remove(signature);
        Ok(())
    }
}
