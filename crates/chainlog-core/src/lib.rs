//! chainlog-core — finality-aware log ingestion with per-signature caches.
//!
//! # Architecture
//!
//! ```text
//! ProcessorBuilder → Processor
//!                      ├── FinalitySource   (finalized block reference)
//!                      ├── LogFetcher       (EngineGateway + range bisection)
//!                      ├── CheckpointStore  (downstream consumption, read-only)
//!                      ├── LogFactory       (decode raw logs by signature)
//!                      └── LogCache × N     (one per signature; commit / rollback)
//! ```

pub mod builder;
pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod error;
pub mod factory;
pub mod fetcher;
pub mod processor;
pub mod source;
pub mod types;
pub mod window;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::ProcessorBuilder;
pub use cache::{CachedLog, EventCache, LogCache};
pub use checkpoint::{CheckpointRecord, CheckpointStore, CheckpointWriter};
pub use config::ProcessorConfig;
pub use cursor::Cursor;
pub use error::{
    CacheError, CheckpointError, ConfigError, DecodeError, GatewayError, ProcessorError,
    SourceError,
};
pub use factory::{DecoderRegistry, FnDecoder, LogDecoder, LogFactory};
pub use fetcher::LogFetcher;
pub use processor::Processor;
pub use source::{EngineGateway, FinalitySource, FixedFinality};
pub use types::{Address, BlockRef, LogContainer, RawLog, RunOutcome, Signature, B256};
pub use window::{compute_window, resume_point, Resume, Window};
