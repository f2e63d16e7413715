//! Engine telemetry for observability and diagnostics.
//!
//! Lock-free atomic counters recorded by the engine's coordinating task and
//! fetch tasks, with point-in-time snapshots for display:
//!
//! ```text
//! Engine events ─────► EngineMetrics ─────► MetricsSnapshot ─────► Views
//!                      (atomic counters)    (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared between the engine and its handle.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    tiles_fetched: AtomicU64,
    empty_tiles: AtomicU64,
    fetch_failures: AtomicU64,
    stale_results: AtomicU64,
    commits: AtomicU64,
    degraded_entries: AtomicU64,
    notices_emitted: AtomicU64,
}

impl EngineMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tile fetch settled successfully and was cached.
    pub fn tile_fetched(&self) {
        self.tiles_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch settled as not-found and was cached as an empty tile.
    pub fn empty_tile(&self) {
        self.empty_tiles.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch failed for a reason other than not-found.
    pub fn fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A settlement arrived for a generation that has moved on.
    pub fn stale_result(&self) {
        self.stale_results.fetch_add(1, Ordering::Relaxed);
    }

    /// A merged collection was committed to the renderer.
    pub fn commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// The engine entered degraded mode.
    pub fn degraded_entered(&self) {
        self.degraded_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// A user notice passed the rate limiter.
    pub fn notice_emitted(&self) {
        self.notices_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tiles_fetched: self.tiles_fetched.load(Ordering::Relaxed),
            empty_tiles: self.empty_tiles.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            degraded_entries: self.degraded_entries.load(Ordering::Relaxed),
            notices_emitted: self.notices_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tiles fetched and cached with content.
    pub tiles_fetched: u64,
    /// Not-found responses cached as empty tiles.
    pub empty_tiles: u64,
    /// Per-tile fetch failures (isolated, non-fatal).
    pub fetch_failures: u64,
    /// Late results discarded by the generation check.
    pub stale_results: u64,
    /// Merge-and-commit calls delivered to the renderer.
    pub commits: u64,
    /// Transitions into degraded mode.
    pub degraded_entries: u64,
    /// User notices that passed the rate limiter.
    pub notices_emitted: u64,
}
