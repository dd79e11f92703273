//! Error types for the log pipeline.

use thiserror::Error;

use crate::types::{Address, Signature};

/// Errors returned by a [`LogCache`](crate::cache::LogCache) on push.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("container for {actual} pushed into cache for {expected}")]
    SignatureMismatch {
        expected: Signature,
        actual: Signature,
    },

    #[error("container value has the wrong type for cache {signature}")]
    TypeMismatch { signature: Signature },

    #[error("cache {signature} is full (capacity {capacity})")]
    Full { signature: Signature, capacity: usize },
}

/// Errors returned by a [`LogFactory`](crate::factory::LogFactory).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no decoder registered for signature {0}")]
    UnknownSignature(Signature),

    #[error("log without topics at block {block_number} index {log_index}")]
    Anonymous { block_number: u64, log_index: u64 },

    #[error("log for {signature} emitted by {actual}, expected {expected}")]
    UnexpectedAddress {
        signature: Signature,
        expected: Address,
        actual: Address,
    },

    #[error("log at block {block_number} index {log_index} belongs to block {actual}")]
    WrongBlock {
        block_number: u64,
        log_index: u64,
        actual: u64,
    },

    #[error("malformed log at block {block_number} index {log_index}: {reason}")]
    Malformed {
        block_number: u64,
        log_index: u64,
        reason: String,
    },
}

/// Errors returned by an [`EngineGateway`](crate::source::EngineGateway).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend refused the range as too much data.
    #[error("range {from}..={to} too large: {message}")]
    RangeTooLarge { from: u64, to: u64, message: String },

    #[error("header not found: {0}")]
    HeaderNotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors returned by a [`FinalitySource`](crate::source::FinalitySource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("no finalized block available yet")]
    NotAvailable,

    #[error("finality source error: {0}")]
    Other(String),
}

/// Errors returned by a [`CheckpointStore`](crate::checkpoint::CheckpointStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt checkpoint for {signature}: {reason}")]
    Corrupt { signature: Signature, reason: String },
}

/// Errors raised while validating configuration or building a processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("signature {0} registered twice")]
    DuplicateSignature(Signature),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that can occur during a processing run.
///
/// Every variant is retryable by the next run: caches are only advanced after
/// a fully successful batch and rolled back otherwise.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("failed to get finalized checkpoint: {0}")]
    Finality(#[source] SourceError),

    #[error("{context}: {source}")]
    Gateway {
        context: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to read checkpoint for {signature}: {source}")]
    Checkpoint {
        signature: Signature,
        #[source]
        source: CheckpointError,
    },

    #[error("failed to decode logs in block {block}: {source}")]
    Decode {
        block: u64,
        #[source]
        source: DecodeError,
    },

    #[error("failed to push container for {signature} in block {block}: {source}")]
    Push {
        block: u64,
        signature: Signature,
        #[source]
        source: CacheError,
    },

    #[error("processing cancelled")]
    Cancelled,
}

impl ProcessorError {
    /// Returns `true` if the run stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the failure happened after caches were touched and
    /// therefore triggered a rollback.
    pub fn rolled_back(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Push { .. })
    }

    pub(crate) fn gateway(context: impl Into<String>, source: GatewayError) -> Self {
        Self::Gateway {
            context: context.into(),
            source,
        }
    }
}
