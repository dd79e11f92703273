//! Processing window: where the next run starts.
//!
//! Each signature contributes a safe resume point, reconciling its cache
//! watermark against the downstream checkpoint:
//!
//! - cache at or ahead of the checkpoint: resume at the cache watermark;
//! - cache behind the checkpoint at block `p`: resume at `p - 1` and install a
//!   resume hint `(p, checkpoint index)` on the cache, so that logs of block
//!   `p` are re-fetched but only the suffix not yet consumed is accepted.
//!
//! The window starts at the minimum resume point, because one fetch pass
//! feeds every cache; per-log filtering keeps caches that are further ahead
//! from seeing logs twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::LogCache;
use crate::checkpoint::{CheckpointRecord, CheckpointStore};
use crate::error::ProcessorError;
use crate::types::Signature;

/// The safe resume point of one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    /// Last block considered processed; fetching restarts at `block + 1`.
    pub block: u64,
    /// Resume hint to install on the cache, if the checkpoint was ahead.
    pub hint: Option<CheckpointRecord>,
}

/// Reconcile a cache watermark with its checkpoint.
pub fn resume_point(cache_block: u64, checkpoint: CheckpointRecord) -> Resume {
    if cache_block >= checkpoint.block_number {
        Resume {
            block: cache_block,
            hint: None,
        }
    } else {
        Resume {
            block: checkpoint.block_number - 1,
            hint: Some(checkpoint),
        }
    }
}

/// The block range of one processing run: `(start, finalized]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub finalized: u64,
}

impl Window {
    /// First block to fetch.
    pub fn first_block(&self) -> u64 {
        self.start + 1
    }
}

/// Compute the run window for `finalized`, installing resume hints on caches
/// that are behind their checkpoint.
///
/// Returns `None` when every cache has already processed `finalized`.
pub async fn compute_window(
    finalized: u64,
    caches: &BTreeMap<Signature, Arc<dyn LogCache>>,
    checkpoints: &dyn CheckpointStore,
) -> Result<Option<Window>, ProcessorError> {
    let mut start = finalized;
    for (signature, cache) in caches {
        let checkpoint = checkpoints
            .record(signature)
            .await
            .map_err(|source| ProcessorError::Checkpoint {
                signature: *signature,
                source,
            })?;
        let cache_block = cache.last_processed_block();
        let resume = resume_point(cache_block, checkpoint);

        // Hints never outlive the run that derived them.
        match resume.hint {
            Some(hint) => {
                debug!(
                    %signature,
                    cache_block,
                    checkpoint_block = hint.block_number,
                    checkpoint_index = hint.log_index,
                    "cache behind checkpoint, resuming inside checkpoint block"
                );
                cache.set_current_processing_block(hint.block_number);
                cache.set_current_processing_index(hint.log_index);
            }
            None => cache.clear_resume_hint(),
        }
        if resume.block > finalized {
            warn!(
                %signature,
                resume = resume.block,
                finalized,
                "cache ahead of finalized block"
            );
        }
        start = start.min(resume.block);
    }

    if start >= finalized {
        return Ok(None);
    }
    Ok(Some(Window { start, finalized }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EventCache;
    use crate::test_utils::{raw_log, MapCheckpoints};
    use crate::types::B256;

    const A: Signature = B256([0xa; 32]);
    const B: Signature = B256([0xb; 32]);

    fn caches(entries: &[(Signature, u64)]) -> BTreeMap<Signature, Arc<dyn LogCache>> {
        entries
            .iter()
            .map(|(s, b)| {
                let cache: Arc<dyn LogCache> = Arc::new(EventCache::<u64>::starting_at(*s, *b));
                (*s, cache)
            })
            .collect()
    }

    #[test]
    fn cache_ahead_of_checkpoint_resumes_at_cache() {
        let r = resume_point(120, CheckpointRecord::new(100, 7));
        assert_eq!(r, Resume { block: 120, hint: None });
        // equal counts as "at least as current"
        assert_eq!(resume_point(100, CheckpointRecord::new(100, 7)).hint, None);
    }

    #[test]
    fn cache_behind_checkpoint_resumes_before_checkpoint_block() {
        let r = resume_point(100, CheckpointRecord::new(150, 3));
        assert_eq!(r.block, 149);
        assert_eq!(r.hint, Some(CheckpointRecord::new(150, 3)));
    }

    #[tokio::test]
    async fn window_uses_minimum_across_signatures() {
        let caches = caches(&[(A, 100), (B, 120)]);
        let store = MapCheckpoints::default();

        let w = compute_window(200, &caches, &store).await.unwrap().unwrap();
        assert_eq!(w, Window { start: 100, finalized: 200 });
        assert_eq!(w.first_block(), 101);
    }

    #[tokio::test]
    async fn window_installs_hint_on_lagging_cache() {
        let caches = caches(&[(A, 100)]);
        let store = MapCheckpoints::default();
        store.set(A, 150, 3);

        let w = compute_window(200, &caches, &store).await.unwrap().unwrap();
        assert_eq!(w.start, 149);

        let cache = &caches[&A];
        assert!(!cache.should_process(&raw_log(A, 150, 3)));
        assert!(cache.should_process(&raw_log(A, 150, 4)));
        assert!(cache.should_process(&raw_log(A, 151, 0)));
        assert!(!cache.should_process(&raw_log(A, 149, 0)));
    }

    #[tokio::test]
    async fn window_clears_hint_once_checkpoint_is_reset() {
        let caches = caches(&[(A, 0)]);
        let store = MapCheckpoints::default();
        store.set(A, 150, 3);
        compute_window(200, &caches, &store).await.unwrap();
        assert!(!caches[&A].should_process(&raw_log(A, 10, 0)));

        store.set(A, 0, 0);
        let w = compute_window(200, &caches, &store).await.unwrap().unwrap();
        assert_eq!(w.start, 0);
        assert!(caches[&A].should_process(&raw_log(A, 10, 0)));
        assert!(caches[&A].should_process(&raw_log(A, 150, 1)));
    }

    #[tokio::test]
    async fn window_replaces_hint_when_checkpoint_moves() {
        let caches = caches(&[(A, 0)]);
        let store = MapCheckpoints::default();
        store.set(A, 150, 3);
        compute_window(200, &caches, &store).await.unwrap();

        store.set(A, 160, 1);
        let w = compute_window(200, &caches, &store).await.unwrap().unwrap();
        assert_eq!(w.start, 159);
        assert!(!caches[&A].should_process(&raw_log(A, 160, 1)));
        assert!(caches[&A].should_process(&raw_log(A, 160, 2)));
    }

    #[tokio::test]
    async fn no_window_when_caught_up() {
        let caches = caches(&[(A, 200), (B, 250)]);
        let store = MapCheckpoints::default();
        assert_eq!(compute_window(200, &caches, &store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn no_caches_means_no_window() {
        let store = MapCheckpoints::default();
        assert_eq!(compute_window(200, &BTreeMap::new(), &store).await.unwrap(), None);
    }
}
