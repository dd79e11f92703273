//! Fluent builder for [`Processor`].
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use chainlog_core::{Processor, EventCache, DecoderRegistry, FixedFinality, BlockRef};
//! # use chainlog_core::{CheckpointStore, EngineGateway, Signature};
//! # fn example(
//! #     deposit_sig: Signature,
//! #     factory: DecoderRegistry,
//! #     gateway: Arc<dyn EngineGateway>,
//! #     checkpoints: Arc<dyn CheckpointStore>,
//! # ) -> Result<(), chainlog_core::ConfigError> {
//! let deposits = Arc::new(EventCache::<u64>::new(deposit_sig));
//! let processor = Processor::builder()
//!     .batch_size(500)
//!     .poll_interval_ms(12_000)
//!     .cache(deposits.clone())
//!     .factory(Arc::new(factory))
//!     .finality(Arc::new(FixedFinality(BlockRef::Finalized)))
//!     .gateway(gateway)
//!     .checkpoints(checkpoints)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::LogCache;
use crate::checkpoint::CheckpointStore;
use crate::config::ProcessorConfig;
use crate::error::ConfigError;
use crate::factory::LogFactory;
use crate::fetcher::LogFetcher;
use crate::processor::Processor;
use crate::source::{EngineGateway, FinalitySource};
use crate::types::Signature;

/// Fluent builder for [`Processor`].
#[derive(Default)]
pub struct ProcessorBuilder {
    config: ProcessorConfig,
    caches: Vec<Arc<dyn LogCache>>,
    factory: Option<Arc<dyn LogFactory>>,
    finality: Option<Arc<dyn FinalitySource>>,
    gateway: Option<Arc<dyn EngineGateway>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of blocks per batch.
    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the interval between runs in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Register a cache under its own signature.
    pub fn cache(mut self, cache: Arc<dyn LogCache>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn factory(mut self, factory: Arc<dyn LogFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn finality(mut self, finality: Arc<dyn FinalitySource>) -> Self {
        self.finality = Some(finality);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn EngineGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Validate and build the processor.
    pub fn build(self) -> Result<Processor, ConfigError> {
        self.config.validate()?;

        let mut caches: BTreeMap<Signature, Arc<dyn LogCache>> = BTreeMap::new();
        for cache in self.caches {
            let signature = cache.signature();
            if caches.insert(signature, cache).is_some() {
                return Err(ConfigError::DuplicateSignature(signature));
            }
        }

        Ok(Processor {
            config: self.config,
            caches,
            factory: self.factory.ok_or(ConfigError::Missing("log factory"))?,
            finality: self.finality.ok_or(ConfigError::Missing("finality source"))?,
            fetcher: LogFetcher::new(self.gateway.ok_or(ConfigError::Missing("engine gateway"))?),
            checkpoints: self
                .checkpoints
                .ok_or(ConfigError::Missing("checkpoint store"))?,
            run_lock: Mutex::new(()),
        })
    }
}
