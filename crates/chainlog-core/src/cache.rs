//! Per-signature log caches.
//!
//! A cache holds decoded values for one event signature until a downstream
//! consumer takes them. The processor is the only writer; it pushes values
//! for a batch, then either commits (values become visible, watermark becomes
//! the new rollback target) or rolls back (staged values are discarded and the
//! watermark reverts to its pre-batch value).

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cursor::Cursor;
use crate::error::CacheError;
use crate::types::{LogContainer, RawLog, Signature};

/// The capability set the processor needs from a cache.
///
/// Methods take `&self`: implementations synchronize internally so that
/// downstream readers on other threads never observe a half-applied batch.
pub trait LogCache: Send + Sync {
    /// The event signature this cache accepts.
    fn signature(&self) -> Signature;

    /// Last block for which every log has been pushed into this cache.
    fn last_processed_block(&self) -> u64;

    fn set_last_processed_block(&self, block_number: u64);

    /// Set the block of the resume hint (see [`Cursor`]).
    fn set_current_processing_block(&self, block_number: u64);

    /// Set the last consumed log index within the resume-hint block.
    fn set_current_processing_index(&self, index: u64);

    /// Drop the resume hint; only the watermark filters logs afterwards.
    fn clear_resume_hint(&self);

    /// Returns `true` if `log` should be decoded and pushed into this cache.
    fn should_process(&self, log: &RawLog) -> bool;

    /// Stage a decoded value. It becomes visible to readers on [`commit`](Self::commit).
    fn push(&self, container: LogContainer) -> Result<(), CacheError>;

    /// Publish staged values and make the current watermark the rollback target.
    fn commit(&self);

    /// Discard staged values and restore the watermark of the last commit.
    fn rollback(&self);
}

/// A decoded value held by an [`EventCache`].
#[derive(Debug)]
pub struct CachedLog<T> {
    pub block_number: u64,
    pub log_index: u64,
    pub value: Arc<T>,
}

impl<T> Clone for CachedLog<T> {
    fn clone(&self) -> Self {
        Self {
            block_number: self.block_number,
            log_index: self.log_index,
            value: Arc::clone(&self.value),
        }
    }
}

#[derive(Debug)]
struct State<T> {
    cursor: Cursor,
    committed_block: u64,
    staged: Vec<CachedLog<T>>,
    ready: VecDeque<CachedLog<T>>,
}

/// In-memory cache for values of type `T` decoded from one event signature.
#[derive(Debug)]
pub struct EventCache<T> {
    signature: Signature,
    capacity: Option<usize>,
    state: Mutex<State<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> EventCache<T> {
    /// Create an empty, unbounded cache starting at block 0.
    pub fn new(signature: Signature) -> Self {
        Self::starting_at(signature, 0)
    }

    /// Create a cache whose watermark starts at `block_number`
    /// (e.g. the block before a contract was deployed).
    pub fn starting_at(signature: Signature, block_number: u64) -> Self {
        Self {
            signature,
            capacity: None,
            state: Mutex::new(State {
                cursor: Cursor::new(block_number),
                committed_block: block_number,
                staged: Vec::new(),
                ready: VecDeque::new(),
            }),
            _marker: PhantomData,
        }
    }

    /// Bound the number of values held (staged + ready).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the cache's cursor.
    pub fn cursor(&self) -> Cursor {
        self.lock().cursor
    }

    /// Number of committed values waiting for a consumer.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ready.is_empty()
    }

    /// Up to `n` committed values, oldest first, without removing them.
    pub fn peek(&self, n: usize) -> Vec<CachedLog<T>> {
        self.lock().ready.iter().take(n).cloned().collect()
    }

    /// Remove and return up to `n` committed values, oldest first.
    pub fn drain(&self, n: usize) -> Vec<CachedLog<T>> {
        let mut state = self.lock();
        let n = n.min(state.ready.len());
        state.ready.drain(..n).collect()
    }

    /// All committed values, oldest first.
    pub fn snapshot(&self) -> Vec<CachedLog<T>> {
        self.lock().ready.iter().cloned().collect()
    }
}

impl<T: Send + Sync + 'static> LogCache for EventCache<T> {
    fn signature(&self) -> Signature {
        self.signature
    }

    fn last_processed_block(&self) -> u64 {
        self.lock().cursor.last_processed_block
    }

    fn set_last_processed_block(&self, block_number: u64) {
        self.lock().cursor.last_processed_block = block_number;
    }

    fn set_current_processing_block(&self, block_number: u64) {
        self.lock().cursor.current_processing_block = Some(block_number);
    }

    fn set_current_processing_index(&self, index: u64) {
        self.lock().cursor.current_processing_index = Some(index);
    }

    fn clear_resume_hint(&self) {
        let mut state = self.lock();
        state.cursor.current_processing_block = None;
        state.cursor.current_processing_index = None;
    }

    fn should_process(&self, log: &RawLog) -> bool {
        log.signature() == Some(self.signature) && self.lock().cursor.admits(log)
    }

    fn push(&self, container: LogContainer) -> Result<(), CacheError> {
        if container.signature() != self.signature {
            return Err(CacheError::SignatureMismatch {
                expected: self.signature,
                actual: container.signature(),
            });
        }
        let value = container
            .downcast::<T>()
            .ok_or(CacheError::TypeMismatch {
                signature: self.signature,
            })?;

        let mut state = self.lock();
        if let Some(capacity) = self.capacity {
            if state.ready.len() + state.staged.len() >= capacity {
                return Err(CacheError::Full {
                    signature: self.signature,
                    capacity,
                });
            }
        }
        state.staged.push(CachedLog {
            block_number: container.block_number(),
            log_index: container.log_index(),
            value,
        });
        Ok(())
    }

    fn commit(&self) {
        let mut state = self.lock();
        let staged = std::mem::take(&mut state.staged);
        state.ready.extend(staged);
        state.committed_block = state.cursor.last_processed_block;
    }

    fn rollback(&self) {
        let mut state = self.lock();
        state.staged.clear();
        state.cursor.last_processed_block = state.committed_block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, B256};

    const SIG: Signature = B256([0xaa; 32]);

    fn container(block: u64, index: u64, value: u64) -> LogContainer {
        LogContainer::new(SIG, block, index, value)
    }

    fn raw(block_number: u64, log_index: u64) -> RawLog {
        RawLog {
            address: Address::default(),
            topics: vec![SIG],
            data: vec![],
            block_number,
            log_index,
            tx_hash: B256::ZERO,
            removed: false,
        }
    }

    #[test]
    fn staged_values_invisible_until_commit() {
        let cache = EventCache::<u64>::new(SIG);
        cache.push(container(1, 0, 10)).unwrap();
        cache.set_last_processed_block(1);
        assert!(cache.is_empty());

        cache.commit();
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.peek(1)[0].value, 10);
    }

    #[test]
    fn rollback_restores_committed_watermark() {
        let cache = EventCache::<u64>::starting_at(SIG, 50);
        cache.set_last_processed_block(60);
        cache.commit();

        cache.push(container(61, 0, 1)).unwrap();
        cache.set_last_processed_block(70);
        cache.rollback();

        assert_eq!(cache.last_processed_block(), 60);
        assert!(cache.is_empty());
        // nothing left staged to leak into the next commit
        cache.commit();
        assert!(cache.is_empty());
    }

    #[test]
    fn push_rejects_foreign_containers() {
        let cache = EventCache::<u64>::new(SIG);
        let other = B256::repeat_byte(0xbb);
        let err = cache
            .push(LogContainer::new(other, 1, 0, 1u64))
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::SignatureMismatch {
                expected: SIG,
                actual: other
            }
        );

        let err = cache
            .push(LogContainer::new(SIG, 1, 0, "text"))
            .unwrap_err();
        assert_eq!(err, CacheError::TypeMismatch { signature: SIG });
    }

    #[test]
    fn capacity_bound_counts_staged_values() {
        let cache = EventCache::<u64>::new(SIG).with_capacity(2);
        cache.push(container(1, 0, 1)).unwrap();
        cache.commit();
        cache.push(container(2, 0, 2)).unwrap();
        assert_eq!(
            cache.push(container(2, 1, 3)).unwrap_err(),
            CacheError::Full {
                signature: SIG,
                capacity: 2
            }
        );
    }

    #[test]
    fn drain_removes_oldest_first() {
        let cache = EventCache::<u64>::new(SIG);
        for i in 0..4 {
            cache.push(container(1, i, i)).unwrap();
        }
        cache.commit();

        let taken = cache.drain(3);
        assert_eq!(taken.iter().map(|c| c.log_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.drain(10).len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn should_process_uses_hint() {
        let cache = EventCache::<u64>::starting_at(SIG, 100);
        cache.set_current_processing_block(150);
        cache.set_current_processing_index(3);

        assert!(!cache.should_process(&raw(150, 3)));
        assert!(cache.should_process(&raw(150, 4)));
        assert!(cache.should_process(&raw(151, 0)));

        let mut foreign = raw(151, 0);
        foreign.topics = vec![B256::repeat_byte(0xbb)];
        assert!(!cache.should_process(&foreign));

        cache.clear_resume_hint();
        assert!(cache.should_process(&raw(150, 0)));
        assert_eq!(cache.cursor(), Cursor::new(100));
    }
}
