//! Shared types for the log pipeline.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Fixed-width identifiers ─────────────────────────────────────────────────

/// Error returned when parsing a fixed-width hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    #[error("invalid hex: {0}")]
    Invalid(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn parse_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexParseError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| HexParseError::Invalid(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexParseError::Length { expected: N, actual })
}

/// A 20-byte contract address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Build an address whose every byte is `b` (handy for fixtures).
    pub const fn repeat_byte(b: u8) -> Self {
        Self([b; 20])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<20>(s).map(Self)
    }
}

/// A 32-byte word: block hashes, transaction hashes, log topics.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct B256(pub [u8; 32]);

impl B256 {
    pub const ZERO: Self = Self([0; 32]);

    /// Build a word whose every byte is `b` (handy for fixtures).
    pub const fn repeat_byte(b: u8) -> Self {
        Self([b; 32])
    }
}

impl fmt::Display for B256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for B256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for B256 {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed::<32>(s).map(Self)
    }
}

/// Event signature (topic 0). Determines which cache a log is routed to.
pub type Signature = B256;

// ─── BlockRef ────────────────────────────────────────────────────────────────

/// An opaque block identifier, resolved to a number by the engine gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRef {
    /// A specific block hash (e.g. the fork-choice finalized hash).
    Hash(B256),
    /// A block number.
    Number(u64),
    /// Whatever the execution client currently considers finalized.
    Finalized,
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(h) => write!(f, "{h}"),
            Self::Number(n) => write!(f, "#{n}"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

// ─── RawLog ──────────────────────────────────────────────────────────────────

/// A raw execution-layer log as fetched from the engine gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics; topic 0 is the event signature.
    pub topics: Vec<B256>,
    /// Non-indexed payload.
    pub data: Vec<u8>,
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u64,
    pub tx_hash: B256,
    /// Set by the node when the log was dropped by a reorg.
    pub removed: bool,
}

impl RawLog {
    /// The event signature, or `None` for anonymous logs.
    pub fn signature(&self) -> Option<Signature> {
        self.topics.first().copied()
    }

    /// `(block_number, log_index)`, the total order of logs on a chain.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

// ─── LogContainer ────────────────────────────────────────────────────────────

/// A decoded log value, tagged with its origin.
///
/// The value is type-erased so that a single factory can feed caches of
/// different event types; [`LogContainer::downcast`] recovers it.
#[derive(Clone)]
pub struct LogContainer {
    signature: Signature,
    block_number: u64,
    log_index: u64,
    value: Arc<dyn Any + Send + Sync>,
}

impl LogContainer {
    pub fn new<T: Any + Send + Sync>(
        signature: Signature,
        block_number: u64,
        log_index: u64,
        value: T,
    ) -> Self {
        Self {
            signature,
            block_number,
            log_index,
            value: Arc::new(value),
        }
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    /// Borrow the decoded value as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Recover a shared handle to the decoded value as `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for LogContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContainer")
            .field("signature", &self.signature)
            .field("block_number", &self.block_number)
            .field("log_index", &self.log_index)
            .finish_non_exhaustive()
    }
}

// ─── RunOutcome ──────────────────────────────────────────────────────────────

/// What a single processing run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every cache had already processed the finalized block.
    UpToDate { finalized: u64 },
    /// Another run was in progress; this one did nothing.
    Skipped,
    /// Blocks `from..=to` were processed.
    Processed {
        from: u64,
        to: u64,
        batches: u64,
        logs: u64,
    },
}

// ─── Tests ────────────────────────────────────────────────────────────────────
