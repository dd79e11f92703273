//! [`FinalitySource`] implementations backed by the execution client or by
//! a fork-choice feed.

use async_trait::async_trait;
use tokio::sync::watch;

use chainlog_core::error::SourceError;
use chainlog_core::source::FinalitySource;
use chainlog_core::types::{BlockRef, B256};

/// Where the finalized reference comes from.
#[derive(Debug, Clone)]
enum Mode {
    /// Delegate to the execution client's `"finalized"` tag.
    ExecutionClient,
    /// Follow finalized hashes published by the consensus side.
    ForkChoice(watch::Receiver<Option<B256>>),
}

/// Finality source for JSON-RPC deployments.
#[derive(Debug, Clone)]
pub struct RpcFinalitySource {
    mode: Mode,
}

impl RpcFinalitySource {
    /// Always yields [`BlockRef::Finalized`]; the gateway resolves it with
    /// `eth_getBlockByNumber("finalized")`.
    pub fn execution_client() -> Self {
        Self {
            mode: Mode::ExecutionClient,
        }
    }

    /// Yields the latest hash published on the returned [`ForkChoiceHandle`].
    /// Until one is published the source reports [`SourceError::NotAvailable`].
    pub fn fork_choice() -> (Self, ForkChoiceHandle) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                mode: Mode::ForkChoice(rx),
            },
            ForkChoiceHandle { tx },
        )
    }
}

#[async_trait]
impl FinalitySource for RpcFinalitySource {
    async fn finalized_checkpoint(&self) -> Result<BlockRef, SourceError> {
        match &self.mode {
            Mode::ExecutionClient => Ok(BlockRef::Finalized),
            Mode::ForkChoice(rx) => (*rx.borrow())
                .map(BlockRef::Hash)
                .ok_or(SourceError::NotAvailable),
        }
    }
}

/// Publishes finalized block hashes to an [`RpcFinalitySource`].
#[derive(Debug)]
pub struct ForkChoiceHandle {
    tx: watch::Sender<Option<B256>>,
}

impl ForkChoiceHandle {
    pub fn set_finalized(&self, hash: B256) {
        self.tx.send_replace(Some(hash));
    }

    /// The most recently published hash.
    pub fn finalized(&self) -> Option<B256> {
        *self.tx.borrow()
    }
}
