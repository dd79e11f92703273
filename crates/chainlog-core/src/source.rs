//! Contracts for the chain-facing collaborators: finality and the execution engine.

use async_trait::async_trait;

use crate::error::{GatewayError, SourceError};
use crate::types::{Address, BlockRef, RawLog};

/// Supplies the current finalized block reference (fork choice).
#[async_trait]
pub trait FinalitySource: Send + Sync {
    async fn finalized_checkpoint(&self) -> Result<BlockRef, SourceError>;
}

/// Access to the execution engine's headers and logs.
#[async_trait]
pub trait EngineGateway: Send + Sync {
    /// Resolve `block` to its block number.
    async fn header_by_reference(&self, block: &BlockRef) -> Result<u64, GatewayError>;

    /// All logs emitted by `addresses` in blocks `from..=to`.
    ///
    /// No ordering is guaranteed. Backends that refuse the range as too large
    /// must return [`GatewayError::RangeTooLarge`].
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        addresses: &[Address],
    ) -> Result<Vec<RawLog>, GatewayError>;
}

/// A [`FinalitySource`] that always returns the same reference.
///
/// Useful when finality is delegated to the execution client
/// (`BlockRef::Finalized`) or pinned in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedFinality(pub BlockRef);

#[async_trait]
impl FinalitySource for FixedFinality {
    async fn finalized_checkpoint(&self) -> Result<BlockRef, SourceError> {
        Ok(self.0)
    }
}
