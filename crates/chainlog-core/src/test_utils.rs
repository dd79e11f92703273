//! In-memory fakes for processor tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::{CheckpointError, GatewayError};
use crate::factory::{DecoderRegistry, FnDecoder, LogDecoder};
use crate::source::EngineGateway;
use crate::types::{Address, BlockRef, RawLog, Signature, B256};

pub(crate) const CONTRACT: Address = Address([0x42; 20]);

/// A log from [`CONTRACT`] carrying `log_index` as an 8-byte payload.
pub(crate) fn raw_log(signature: Signature, block_number: u64, log_index: u64) -> RawLog {
    RawLog {
        address: CONTRACT,
        topics: vec![signature],
        data: log_index.to_be_bytes().to_vec(),
        block_number,
        log_index,
        tx_hash: B256::repeat_byte(block_number as u8),
        removed: false,
    }
}

/// Decoder producing the `u64` payload of [`raw_log`]; empty payloads fail.
pub(crate) fn u64_decoder(signature: Signature) -> Arc<dyn LogDecoder> {
    u64_decoder_at(signature, CONTRACT)
}

/// Like [`u64_decoder`], for logs emitted by `address`.
pub(crate) fn u64_decoder_at(signature: Signature, address: Address) -> Arc<dyn LogDecoder> {
    Arc::new(FnDecoder::new(signature, address, |log: &RawLog| {
        let bytes: [u8; 8] = log
            .data
            .as_slice()
            .try_into()
            .map_err(|_| "bad payload".to_string())?;
        Ok(u64::from_be_bytes(bytes))
    }))
}

pub(crate) fn registry(signatures: &[Signature]) -> DecoderRegistry {
    signatures
        .iter()
        .try_fold(DecoderRegistry::new(), |r, s| r.register(u64_decoder(*s)))
        .expect("distinct signatures")
}

/// Engine gateway over a fixed set of logs.
///
/// Logs are returned in reverse insertion order so callers cannot rely on
/// backend ordering.
pub(crate) struct MockGateway {
    finalized: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    calls: Mutex<Vec<(u64, u64)>>,
    max_range: Option<u64>,
    failures: AtomicU64,
    hang: Mutex<Option<(usize, CancellationToken)>>,
}

impl MockGateway {
    pub(crate) fn new(finalized: u64) -> Self {
        Self {
            finalized: AtomicU64::new(finalized),
            logs: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            max_range: None,
            failures: AtomicU64::new(0),
            hang: Mutex::new(None),
        }
    }

    /// Refuse ranges spanning more than `blocks` blocks.
    pub(crate) fn with_max_range(mut self, blocks: u64) -> Self {
        self.max_range = Some(blocks);
        self
    }

    pub(crate) fn set_finalized(&self, block: u64) {
        self.finalized.store(block, Ordering::SeqCst);
    }

    pub(crate) fn add_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    /// Keep only the logs for which `keep` returns `true`.
    pub(crate) fn retain_logs(&self, keep: impl Fn(&RawLog) -> bool) {
        self.logs.lock().unwrap().retain(|l| keep(l));
    }

    /// Fail the next `n` `get_logs` calls with a transport error.
    pub(crate) fn fail_next_get_logs(&self, n: u64) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// On the `call`-th `get_logs` (1-based), cancel `token` and never return.
    pub(crate) fn cancel_and_hang_on_call(&self, call: usize, token: CancellationToken) {
        *self.hang.lock().unwrap() = Some((call, token));
    }

    /// Every `(from, to)` passed to `get_logs`, in call order.
    pub(crate) fn calls(&self) -> Vec<(u64, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineGateway for MockGateway {
    async fn header_by_reference(&self, block: &BlockRef) -> Result<u64, GatewayError> {
        match block {
            BlockRef::Number(n) => Ok(*n),
            BlockRef::Hash(_) | BlockRef::Finalized => Ok(self.finalized.load(Ordering::SeqCst)),
        }
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        addresses: &[Address],
    ) -> Result<Vec<RawLog>, GatewayError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((from, to));
            calls.len()
        };
        let hang = self.hang.lock().unwrap().clone();
        if let Some((n, token)) = hang {
            if n == call {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        if let Some(max) = self.max_range {
            if to - from + 1 > max {
                return Err(GatewayError::RangeTooLarge {
                    from,
                    to,
                    message: "query returned more than 10000 results".into(),
                });
            }
        }
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|l| (from..=to).contains(&l.block_number) && addresses.contains(&l.address))
            .cloned()
            .collect())
    }
}

/// Checkpoint store backed by a map.
#[derive(Default)]
pub(crate) struct MapCheckpoints {
    records: Mutex<HashMap<Signature, CheckpointRecord>>,
}

impl MapCheckpoints {
    pub(crate) fn set(&self, signature: Signature, block_number: u64, log_index: u64) {
        self.records
            .lock()
            .unwrap()
            .insert(signature, CheckpointRecord::new(block_number, log_index));
    }
}

#[async_trait]
impl CheckpointStore for MapCheckpoints {
    async fn record(&self, signature: &Signature) -> Result<CheckpointRecord, CheckpointError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(signature)
            .copied()
            .unwrap_or_default())
    }
}
