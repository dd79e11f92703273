//! Log factory: turns raw logs into typed, signature-tagged containers.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ConfigError, DecodeError};
use crate::types::{Address, LogContainer, RawLog, Signature};

/// Decodes raw logs for the processor.
pub trait LogFactory: Send + Sync {
    /// Contract addresses whose logs should be fetched.
    fn registered_addresses(&self) -> Vec<Address>;

    /// Returns `true` if `log` comes from the emitter registered for its
    /// signature. Logs it refuses are dropped by the processor, not decoded.
    fn accepts(&self, log: &RawLog) -> bool;

    /// Decode every log of `block_number`, one container per log, in input order.
    fn decode(
        &self,
        logs: &[RawLog],
        block_number: u64,
    ) -> Result<Vec<LogContainer>, DecodeError>;
}

/// Decoder for a single event signature.
pub trait LogDecoder: Send + Sync {
    fn signature(&self) -> Signature;

    /// The contract expected to emit this event.
    fn address(&self) -> Address;

    fn decode(&self, log: &RawLog) -> Result<LogContainer, DecodeError>;
}

/// A [`LogDecoder`] backed by a closure producing values of type `T`.
pub struct FnDecoder<T, F> {
    signature: Signature,
    address: Address,
    decode_fn: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> FnDecoder<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&RawLog) -> Result<T, String> + Send + Sync,
{
    pub fn new(signature: Signature, address: Address, decode_fn: F) -> Self {
        Self {
            signature,
            address,
            decode_fn,
            _marker: PhantomData,
        }
    }
}

impl<T, F> LogDecoder for FnDecoder<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&RawLog) -> Result<T, String> + Send + Sync,
{
    fn signature(&self) -> Signature {
        self.signature
    }

    fn address(&self) -> Address {
        self.address
    }

    fn decode(&self, log: &RawLog) -> Result<LogContainer, DecodeError> {
        let value = (self.decode_fn)(log).map_err(|reason| DecodeError::Malformed {
            block_number: log.block_number,
            log_index: log.log_index,
            reason,
        })?;
        Ok(LogContainer::new(
            self.signature,
            log.block_number,
            log.log_index,
            value,
        ))
    }
}

/// The standard [`LogFactory`]: a fixed set of decoders keyed by signature.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: BTreeMap<Signature, Arc<dyn LogDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder. Each signature may only be registered once.
    pub fn register(mut self, decoder: Arc<dyn LogDecoder>) -> Result<Self, ConfigError> {
        let signature = decoder.signature();
        if self.decoders.contains_key(&signature) {
            return Err(ConfigError::DuplicateSignature(signature));
        }
        self.decoders.insert(signature, decoder);
        Ok(self)
    }

    /// Registered signatures, in ascending order.
    pub fn signatures(&self) -> impl Iterator<Item = Signature> + '_ {
        self.decoders.keys().copied()
    }

    fn decode_one(&self, log: &RawLog, block_number: u64) -> Result<LogContainer, DecodeError> {
        if log.block_number != block_number {
            return Err(DecodeError::WrongBlock {
                block_number,
                log_index: log.log_index,
                actual: log.block_number,
            });
        }
        let signature = log.signature().ok_or(DecodeError::Anonymous {
            block_number: log.block_number,
            log_index: log.log_index,
        })?;
        let decoder = self
            .decoders
            .get(&signature)
            .ok_or(DecodeError::UnknownSignature(signature))?;
        if decoder.address() != log.address {
            return Err(DecodeError::UnexpectedAddress {
                signature,
                expected: decoder.address(),
                actual: log.address,
            });
        }
        decoder.decode(log)
    }
}

impl LogFactory for DecoderRegistry {
    fn registered_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.decoders.values().map(|d| d.address()).collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    fn accepts(&self, log: &RawLog) -> bool {
        log.signature()
            .and_then(|signature| self.decoders.get(&signature))
            .is_some_and(|decoder| decoder.address() == log.address)
    }

    fn decode(
        &self,
        logs: &[RawLog],
        block_number: u64,
    ) -> Result<Vec<LogContainer>, DecodeError> {
        logs.iter()
            .map(|log| self.decode_one(log, block_number))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::B256;

    const DEPOSIT: Signature = B256([1; 32]);
    const WITHDRAWAL: Signature = B256([2; 32]);
    const CONTRACT: Address = Address([9; 20]);

    fn amount_decoder(sig: Signature) -> Arc<dyn LogDecoder> {
        Arc::new(FnDecoder::new(sig, CONTRACT, |log: &RawLog| {
            let bytes: [u8; 8] = log
                .data
                .as_slice()
                .try_into()
                .map_err(|_| format!("expected 8 bytes, got {}", log.data.len()))?;
            Ok(u64::from_be_bytes(bytes))
        }))
    }

    fn log(sig: Signature, block_number: u64, log_index: u64, amount: u64) -> RawLog {
        RawLog {
            address: CONTRACT,
            topics: vec![sig],
            data: amount.to_be_bytes().to_vec(),
            block_number,
            log_index,
            tx_hash: B256::ZERO,
            removed: false,
        }
    }

    fn registry() -> DecoderRegistry {
        DecoderRegistry::new()
            .register(amount_decoder(DEPOSIT))
            .unwrap()
            .register(amount_decoder(WITHDRAWAL))
            .unwrap()
    }

    #[test]
    fn duplicate_signature_rejected() {
        let err = registry().register(amount_decoder(DEPOSIT)).err().unwrap();
        assert_eq!(err, ConfigError::DuplicateSignature(DEPOSIT));
    }

    #[test]
    fn addresses_are_deduplicated() {
        assert_eq!(registry().registered_addresses(), vec![CONTRACT]);
    }

    #[test]
    fn decode_routes_by_signature_in_order() {
        let logs = vec![log(WITHDRAWAL, 5, 0, 7), log(DEPOSIT, 5, 1, 32)];
        let out = registry().decode(&logs, 5).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].signature(), WITHDRAWAL);
        assert_eq!(out[0].downcast_ref::<u64>(), Some(&7));
        assert_eq!(out[1].signature(), DEPOSIT);
        assert_eq!(out[1].log_index(), 1);
    }

    #[test]
    fn malformed_payload_fails_whole_call() {
        let mut bad = log(DEPOSIT, 5, 1, 0);
        bad.data = vec![1, 2, 3];
        let logs = vec![log(DEPOSIT, 5, 0, 1), bad];
        let err = registry().decode(&logs, 5).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { log_index: 1, .. }));
    }

    #[test]
    fn accepts_only_registered_emitter() {
        let r = registry();
        assert!(r.accepts(&log(DEPOSIT, 5, 0, 1)));

        let mut foreign = log(DEPOSIT, 5, 0, 1);
        foreign.address = Address::repeat_byte(0xee);
        assert!(!r.accepts(&foreign));

        assert!(!r.accepts(&log(B256::repeat_byte(3), 5, 0, 1)));
        let mut anonymous = log(DEPOSIT, 5, 0, 1);
        anonymous.topics.clear();
        assert!(!r.accepts(&anonymous));
    }

    #[test]
    fn rejects_wrong_emitter_and_block() {
        let mut spoofed = log(DEPOSIT, 5, 0, 1);
        spoofed.address = Address::repeat_byte(0xee);
        assert!(matches!(
            registry().decode(&[spoofed], 5),
            Err(DecodeError::UnexpectedAddress { .. })
        ));
        assert!(matches!(
            registry().decode(&[log(DEPOSIT, 6, 0, 1)], 5),
            Err(DecodeError::WrongBlock { actual: 6, .. })
        ));
    }
}
