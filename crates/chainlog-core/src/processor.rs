//! The log processor. Brings every cache up to the finalized block.
//!
//! # One run
//! 1. Resolve the finalized block number.
//! 2. Compute the window from cache watermarks and checkpoints.
//! 3. Walk the window in batches of `batch_size` blocks:
//!    fetch logs → group by block → filter per cache → decode → push.
//! 4. After a batch succeeds every cache is advanced to its last block and
//!    committed; if any block fails, every cache is rolled back.
//!
//! # Periodic loop
//! [`Processor::run`] repeats a run every `poll_interval_ms` until the
//! cancellation token fires. Runs never overlap; failed runs are logged and
//! retried on the next tick.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builder::ProcessorBuilder;
use crate::cache::LogCache;
use crate::checkpoint::CheckpointStore;
use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::factory::LogFactory;
use crate::fetcher::LogFetcher;
use crate::source::FinalitySource;
use crate::types::{Address, RawLog, RunOutcome, Signature};
use crate::window::compute_window;

/// Orchestrates finality, checkpoints, the engine gateway, the factory and
/// the caches.
pub struct Processor {
    pub(crate) config: ProcessorConfig,
    pub(crate) caches: BTreeMap<Signature, Arc<dyn LogCache>>,
    pub(crate) factory: Arc<dyn LogFactory>,
    pub(crate) finality: Arc<dyn FinalitySource>,
    pub(crate) fetcher: LogFetcher,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    /// Held for the duration of a run.
    pub(crate) run_lock: Mutex<()>,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The cache registered for `signature`.
    pub fn cache(&self, signature: &Signature) -> Option<&Arc<dyn LogCache>> {
        self.caches.get(signature)
    }

    /// Process every block from the caches' resume point to the latest
    /// finalized block.
    ///
    /// Returns [`RunOutcome::Skipped`] without doing anything if another run
    /// is in progress.
    pub async fn process_past_logs(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, ProcessorError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            debug!("log processing already running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let finalized = self.latest_finalized_block(cancel).await?;
        let Some(window) =
            compute_window(finalized, &self.caches, self.checkpoints.as_ref()).await?
        else {
            debug!(finalized, "all caches up to date");
            return Ok(RunOutcome::UpToDate { finalized });
        };

        let addresses = self.factory.registered_addresses();
        info!(
            from = window.first_block(),
            to = finalized,
            "processing past logs"
        );

        let mut current = window.start;
        let mut batches = 0;
        let mut logs = 0;
        while current < finalized {
            if cancel.is_cancelled() {
                return Err(ProcessorError::Cancelled);
            }
            let (to, delivered) = self
                .process_blocks_in_batch(current + 1, finalized, &addresses, cancel)
                .await?;
            current = to;
            batches += 1;
            logs += delivered;
        }

        info!(
            from = window.first_block(),
            to = finalized,
            batches,
            logs,
            "past logs processed"
        );
        Ok(RunOutcome::Processed {
            from: window.first_block(),
            to: finalized,
            batches,
            logs,
        })
    }

    /// Run [`process_past_logs`](Self::process_past_logs) every poll interval
    /// until `cancel` fires.
    ///
    /// The first run starts immediately. Errors are logged and retried on the
    /// next tick; a run in progress is awaited, never interrupted mid-batch.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            caches = self.caches.len(),
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval_ms,
            "log processor started"
        );
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.process_past_logs(&cancel).await {
                        Ok(outcome) => debug!(?outcome, "log processing run finished"),
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => error!(error = %e, "failed to process past logs"),
                    }
                }
            }
        }
        info!("log processor stopped");
    }

    /// Spawn [`run`](Self::run) on the current Tokio runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn latest_finalized_block(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u64, ProcessorError> {
        let reference = cancellable(cancel, self.finality.finalized_checkpoint())
            .await?
            .map_err(ProcessorError::Finality)?;
        cancellable(cancel, self.fetcher.block_number(&reference))
            .await?
            .map_err(|e| {
                ProcessorError::gateway(format!("failed to get finalized header {reference}"), e)
            })
    }

    /// Process blocks `from..=min(from + batch_size - 1, finalized)`.
    ///
    /// Returns the last block of the batch and the number of logs delivered.
    /// On failure every cache is rolled back to its pre-batch watermark.
    pub(crate) async fn process_blocks_in_batch(
        &self,
        from: u64,
        finalized: u64,
        addresses: &[Address],
        cancel: &CancellationToken,
    ) -> Result<(u64, u64), ProcessorError> {
        let to = from
            .saturating_add(self.config.batch_size - 1)
            .min(finalized);

        let logs = cancellable(cancel, self.fetcher.logs(from, to, addresses))
            .await?
            .map_err(|e| ProcessorError::gateway(format!("failed to get logs {from}..={to}"), e))?;

        let mut block_to_logs: BTreeMap<u64, Vec<RawLog>> = BTreeMap::new();
        for log in logs {
            if log.removed {
                continue;
            }
            if !(from..=to).contains(&log.block_number) {
                warn!(
                    block = log.block_number,
                    from, to, "gateway returned log outside requested range"
                );
                continue;
            }
            block_to_logs.entry(log.block_number).or_default().push(log);
        }

        let mut delivered = 0;
        for (block_number, mut logs) in block_to_logs {
            logs.sort_by_key(RawLog::position);
            match self.process_logs_in_block(&logs, block_number) {
                Ok(n) => delivered += n,
                Err(e) => {
                    warn!(block = block_number, from, to, error = %e, "rolling back caches");
                    self.rollback_caches();
                    return Err(e);
                }
            }
        }

        // Blocks without logs count as processed too.
        self.set_last_processed_block_all_caches(to);
        self.commit_caches();

        info!(from, to, logs = delivered, "batch complete");
        Ok((to, delivered))
    }

    /// Filter, decode and push the logs of one block, then advance every
    /// cache to `block_number`.
    fn process_logs_in_block(
        &self,
        logs: &[RawLog],
        block_number: u64,
    ) -> Result<u64, ProcessorError> {
        let filtered: Vec<RawLog> = logs
            .iter()
            .filter(|log| {
                let Some(cache) = log.signature().and_then(|sig| self.caches.get(&sig)) else {
                    return false;
                };
                if !self.factory.accepts(log) {
                    debug!(
                        block = block_number,
                        index = log.log_index,
                        emitter = %log.address,
                        "dropping log from unregistered emitter"
                    );
                    return false;
                }
                cache.should_process(log)
            })
            .cloned()
            .collect();

        if !filtered.is_empty() {
            let containers = self
                .factory
                .decode(&filtered, block_number)
                .map_err(|source| ProcessorError::Decode {
                    block: block_number,
                    source,
                })?;
            for container in containers {
                let signature = container.signature();
                if let Some(cache) = self.caches.get(&signature) {
                    cache
                        .push(container)
                        .map_err(|source| ProcessorError::Push {
                            block: block_number,
                            signature,
                            source,
                        })?;
                }
            }
        }

        self.set_last_processed_block_all_caches(block_number);
        Ok(filtered.len() as u64)
    }

    /// Raise every cache's watermark to `block_number`; caches already past
    /// it are left alone.
    fn set_last_processed_block_all_caches(&self, block_number: u64) {
        for cache in self.caches.values() {
            if cache.last_processed_block() < block_number {
                cache.set_last_processed_block(block_number);
            }
        }
    }

    fn commit_caches(&self) {
        for cache in self.caches.values() {
            cache.commit();
        }
    }

    fn rollback_caches(&self) {
        for cache in self.caches.values() {
            cache.rollback();
        }
    }
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ProcessorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProcessorError::Cancelled),
        out = fut => Ok(out),
    }
}
