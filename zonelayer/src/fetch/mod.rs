//! Bounded-concurrency fetch scheduling with request de-duplication.
//!
//! The scheduler owns the engine's in-flight bookkeeping: which keys have an
//! outstanding network fetch, and which keys the single live batch is still
//! waiting on. Fetch tasks run concurrently up to the configured pool size;
//! all state mutation happens on the engine's coordinating task when a
//! [`FetchSettled`] message is drained from the results channel, so the
//! bookkeeping itself needs no locking.
//!
//! There is no hard cancellation: a superseded fetch keeps running until it
//! settles, at which point [`FetchScheduler::on_settled`] classifies it as
//! stale and the result is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::coord::TileKey;
use crate::engine::Generation;
use crate::source::{FetchError, TileFetcher};
use crate::tile::TileContent;

/// Message sent from a fetch task back to the engine when a fetch settles.
#[derive(Debug)]
pub struct FetchSettled {
    /// The tile the fetch was for.
    pub key: TileKey,
    /// The raw fetch outcome; not-found is mapped to an empty tile in
    /// [`FetchScheduler::on_settled`], not here.
    pub outcome: Result<TileContent, FetchError>,
}

/// The keys submitted for one generation.
#[derive(Debug)]
struct FetchBatch {
    generation: Generation,
    remaining: HashSet<TileKey>,
}

/// What the engine should do with a recorded settlement.
#[derive(Debug, PartialEq)]
pub enum Settlement {
    /// The tile belongs to the live batch: cache the content. A not-found
    /// response arrives here as empty content.
    Apply {
        /// Decoded tile content to cache.
        content: TileContent,
        /// True when this settlement drained the batch.
        batch_complete: bool,
    },
    /// Non-fatal per-tile failure; siblings are unaffected and the batch
    /// still completes.
    Failed {
        /// The per-tile error, for logging.
        error: FetchError,
        /// True when this settlement drained the batch.
        batch_complete: bool,
    },
    /// The result arrived for a generation that has moved on; drop it.
    Stale,
}

/// Bounded-concurrency orchestrator for tile fetches.
pub struct FetchScheduler {
    fetcher: Arc<dyn TileFetcher>,
    permits: Arc<Semaphore>,
    results_tx: mpsc::UnboundedSender<FetchSettled>,
    in_flight: HashSet<TileKey>,
    batch: Option<FetchBatch>,
}

impl FetchScheduler {
    /// Create a scheduler with a fetch pool of `max_concurrent` permits.
    ///
    /// Settlements are delivered on `results_tx`; the engine loop drains
    /// the receiving end and feeds them back through [`Self::on_settled`].
    pub fn new(
        fetcher: Arc<dyn TileFetcher>,
        max_concurrent: usize,
        results_tx: mpsc::UnboundedSender<FetchSettled>,
    ) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            results_tx,
            in_flight: HashSet::new(),
            batch: None,
        }
    }

    /// Install `keys` as the live batch for `generation` and start fetches
    /// for every key without one already outstanding.
    ///
    /// Keys already in flight are adopted by the new batch without a second
    /// request: their eventual settlement counts against this batch.
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, keys: HashSet<TileKey>, generation: Generation, url_template: &str) {
        for key in &keys {
            if self.in_flight.contains(key) {
                debug!(key = %key, "fetch already in flight; joining existing request");
                continue;
            }
            self.spawn_fetch(*key, url_template);
        }
        self.batch = Some(FetchBatch {
            generation,
            remaining: keys,
        });
    }

    fn spawn_fetch(&mut self, key: TileKey, url_template: &str) {
        self.in_flight.insert(key);

        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::clone(&self.permits);
        let results_tx = self.results_tx.clone();
        let template = url_template.to_string();

        tokio::spawn(async move {
            // A closed semaphore means the engine is shutting down.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let outcome = fetcher.fetch(&template, key).await;
            // The receiver is gone only when the engine loop has stopped.
            let _ = results_tx.send(FetchSettled { key, outcome });
        });
    }

    /// Record a settlement against the live generation.
    ///
    /// The key leaves the in-flight set unconditionally the instant the
    /// fetch settles; whether the result is applied depends on the batch
    /// still being live and still wanting the key.
    pub fn on_settled(&mut self, settled: FetchSettled, live: Generation) -> Settlement {
        self.in_flight.remove(&settled.key);

        let Some(batch) = self.batch.as_mut() else {
            return Settlement::Stale;
        };
        if batch.generation != live || !batch.remaining.remove(&settled.key) {
            return Settlement::Stale;
        }

        let batch_complete = batch.remaining.is_empty();
        if batch_complete {
            self.batch = None;
        }

        match settled.outcome {
            Ok(content) => Settlement::Apply {
                content,
                batch_complete,
            },
            // Upstream omits tiles with no features: not-found is a
            // successful empty tile, never an error.
            Err(FetchError::NotFound) => Settlement::Apply {
                content: TileContent::empty(),
                batch_complete,
            },
            Err(error) => Settlement::Failed {
                error,
                batch_complete,
            },
        }
    }

    /// Drop the live batch and forget every in-flight key.
    ///
    /// Outstanding network calls are not cancelled; their settlements will
    /// arrive stale and be dropped.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.batch = None;
    }

    /// Number of keys with an outstanding fetch.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// True when a batch is still waiting on settlements.
    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }
}

impl std::fmt::Debug for FetchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchScheduler")
            .field("in_flight", &self.in_flight.len())
            .field("available_permits", &self.permits.available_permits())
            .field("has_batch", &self.batch.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock fetcher whose fetches block until the test releases them.
    struct GatedFetcher {
        gate: Semaphore,
        calls: Mutex<Vec<TileKey>>,
        concurrent: AtomicUsize,
        peak_concurrent: AtomicUsize,
        outcome: fn(TileKey) -> Result<TileContent, FetchError>,
    }

    impl GatedFetcher {
        fn new(outcome: fn(TileKey) -> Result<TileContent, FetchError>) -> Self {
            Self {
                gate: Semaphore::new(0),
                calls: Mutex::new(Vec::new()),
                concurrent: AtomicUsize::new(0),
                peak_concurrent: AtomicUsize::new(0),
                outcome,
            }
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl TileFetcher for GatedFetcher {
        fn fetch<'a>(
            &'a self,
            _url_template: &'a str,
            key: TileKey,
        ) -> Pin<Box<dyn Future<Output = Result<TileContent, FetchError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(key);
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_concurrent.fetch_max(current, Ordering::SeqCst);

                // Consume the release permit; dropping it would hand it
                // back to the gate and unblock every later fetch at once.
                self.gate.acquire().await.unwrap().forget();

                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                (self.outcome)(key)
            })
        }
    }

    fn ok_empty(_key: TileKey) -> Result<TileContent, FetchError> {
        Ok(TileContent::empty())
    }

    fn keys(range: std::ops::Range<u32>) -> HashSet<TileKey> {
        range.map(|x| TileKey::new(14, x, 0)).collect()
    }

    async fn drain(
        rx: &mut mpsc::UnboundedReceiver<FetchSettled>,
        count: usize,
    ) -> Vec<FetchSettled> {
        let mut settled = Vec::with_capacity(count);
        for _ in 0..count {
            settled.push(
                tokio::time::timeout(Duration::from_secs(5), rx.recv())
                    .await
                    .expect("timed out waiting for settlement")
                    .expect("results channel closed"),
            );
        }
        settled
    }

    #[tokio::test]
    async fn test_batch_settles_and_completes() {
        let fetcher = Arc::new(GatedFetcher::new(ok_empty));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        let gen = generation.bump();
        scheduler.submit(keys(0..3), gen, "t");
        fetcher.release(3);

        let mut completions = 0;
        for settled in drain(&mut rx, 3).await {
            match scheduler.on_settled(settled, generation) {
                Settlement::Apply { batch_complete, .. } => {
                    if batch_complete {
                        completions += 1;
                    }
                }
                other => panic!("unexpected settlement: {other:?}"),
            }
        }

        assert_eq!(completions, 1, "exactly the last settlement completes");
        assert!(!scheduler.has_batch());
        assert_eq!(scheduler.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_pool_size() {
        let fetcher = Arc::new(GatedFetcher::new(ok_empty));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 2, tx);
        let mut generation = Generation::new();

        scheduler.submit(keys(0..8), generation.bump(), "t");

        // Release fetches one at a time; the pool admits a new task per
        // released permit, so the peak stays at the pool size.
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fetcher.release(1);
        }
        drain(&mut rx, 8).await;

        assert!(
            fetcher.peak_concurrent.load(Ordering::SeqCst) <= 2,
            "peak concurrency {} exceeded pool size 2",
            fetcher.peak_concurrent.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_overlapping_submissions_share_one_fetch() {
        let fetcher = Arc::new(GatedFetcher::new(ok_empty));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        let shared = TileKey::new(14, 7, 7);
        let first: HashSet<_> = [shared].into_iter().collect();
        scheduler.submit(first, generation.bump(), "t");

        // Wait for the fetch task to actually start.
        while fetcher.call_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Second submission requires the same key before the first settles.
        let second: HashSet<_> = [shared].into_iter().collect();
        let gen2 = generation.bump();
        scheduler.submit(second, gen2, "t");

        fetcher.release(1);
        let settled = drain(&mut rx, 1).await.pop().unwrap();

        // Exactly one underlying fetch was issued, and its settlement is
        // applied to the batch that now owns the key.
        assert_eq!(fetcher.call_count(), 1);
        match scheduler.on_settled(settled, generation) {
            Settlement::Apply { batch_complete, .. } => assert!(batch_complete),
            other => panic!("unexpected settlement: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_settlement_after_clear_is_stale() {
        let fetcher = Arc::new(GatedFetcher::new(ok_empty));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        scheduler.submit(keys(0..3), generation.bump(), "t");
        scheduler.clear();
        generation.bump();
        fetcher.release(3);

        for settled in drain(&mut rx, 3).await {
            assert_eq!(
                scheduler.on_settled(settled, generation),
                Settlement::Stale
            );
        }
        assert_eq!(scheduler.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_key_dropped_from_new_batch_settles_stale() {
        let fetcher = Arc::new(GatedFetcher::new(ok_empty));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        let old = TileKey::new(14, 1, 1);
        let new = TileKey::new(14, 2, 2);
        scheduler.submit([old].into_iter().collect(), generation.bump(), "t");

        // Viewport moved on: the new batch no longer wants `old`.
        scheduler.submit([new].into_iter().collect(), generation.bump(), "t");

        fetcher.release(2);
        for settled in drain(&mut rx, 2).await {
            let expected_stale = settled.key == old;
            let settlement = scheduler.on_settled(settled, generation);
            if expected_stale {
                assert_eq!(settlement, Settlement::Stale);
            } else {
                assert!(matches!(settlement, Settlement::Apply { .. }));
            }
        }
    }

    #[tokio::test]
    async fn test_not_found_becomes_empty_tile() {
        fn not_found(_key: TileKey) -> Result<TileContent, FetchError> {
            Err(FetchError::NotFound)
        }

        let fetcher = Arc::new(GatedFetcher::new(not_found));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        let key = TileKey::new(8, 113, 51);
        scheduler.submit([key].into_iter().collect(), generation.bump(), "t");
        fetcher.release(1);

        let settled = drain(&mut rx, 1).await.pop().unwrap();
        match scheduler.on_settled(settled, generation) {
            Settlement::Apply {
                content,
                batch_complete,
            } => {
                assert!(content.is_empty());
                assert!(batch_complete);
            }
            other => panic!("not-found should apply as empty, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_batch_still_completes() {
        fn failing(key: TileKey) -> Result<TileContent, FetchError> {
            if key.x == 0 {
                Err(FetchError::Failed("connection reset".into()))
            } else {
                Ok(TileContent::empty())
            }
        }

        let fetcher = Arc::new(GatedFetcher::new(failing));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FetchScheduler::new(fetcher.clone(), 4, tx);
        let mut generation = Generation::new();

        scheduler.submit(keys(0..2), generation.bump(), "t");
        fetcher.release(2);

        let mut applied = 0;
        let mut failed = 0;
        let mut completions = 0;
        for settled in drain(&mut rx, 2).await {
            match scheduler.on_settled(settled, generation) {
                Settlement::Apply { batch_complete, .. } => {
                    applied += 1;
                    completions += batch_complete as usize;
                }
                Settlement::Failed { batch_complete, .. } => {
                    failed += 1;
                    completions += batch_complete as usize;
                }
                Settlement::Stale => panic!("unexpected stale settlement"),
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(failed, 1);
        assert_eq!(completions, 1, "batch completes despite the failure");
    }
}
