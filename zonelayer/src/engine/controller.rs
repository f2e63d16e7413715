//! Viewport controller: the engine's state machine.
//!
//! One controller instance is exclusively owned by the engine loop. It holds
//! the tile cache, the fetch scheduler's in-flight bookkeeping, and the
//! generation counter, and it is the only writer of any of them. Fetch tasks
//! run concurrently, but their results come back through the loop and are
//! applied here, in settlement order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::TileCache;
use crate::coord::{required_set, tile_count, GeoBounds, TileKey};
use crate::fetch::{FetchScheduler, FetchSettled, Settlement};
use crate::notice::{NoticeReason, NoticeSink, NoticeThrottle};
use crate::render::RenderSink;
use crate::source::TileFetcher;
use crate::telemetry::EngineMetrics;
use crate::tile::ZoneFeature;

use super::commit::CommitScheduler;
use super::config::EngineConfig;
use super::generation::Generation;

/// Whether the overlay is showing full detail or the coarse fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Tiles are fetched and shown at full detail.
    Normal,
    /// The coarse overview is shown; no tile fetch is attempted.
    Degraded,
}

/// The engine's state machine, driven by the owner event loop.
pub struct ViewportController {
    config: EngineConfig,
    mode: EngineMode,
    enabled: bool,
    generation: Generation,
    cache: TileCache,
    scheduler: FetchScheduler,
    committer: CommitScheduler,
    throttle: NoticeThrottle,
    render: Arc<dyn RenderSink>,
    notices: Arc<dyn NoticeSink>,
    metrics: Arc<EngineMetrics>,
    /// Tile URL template, present while enabled.
    url_template: Option<String>,
    /// Last viewport seen, recorded even while disabled so that enabling
    /// can evaluate immediately.
    last_viewport: Option<(GeoBounds, f64)>,
    /// The required set driving the current batch/commit cycle.
    current_required: HashSet<TileKey>,
    /// The required set as of the last successful commit; used to skip
    /// redundant commits on repeated identical viewports.
    last_committed: Option<HashSet<TileKey>>,
}

impl ViewportController {
    pub(crate) fn new(
        config: EngineConfig,
        fetcher: Arc<dyn TileFetcher>,
        results_tx: mpsc::UnboundedSender<FetchSettled>,
        render: Arc<dyn RenderSink>,
        notices: Arc<dyn NoticeSink>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let scheduler = FetchScheduler::new(fetcher, config.max_concurrent_fetches, results_tx);
        let committer = CommitScheduler::new(config.frame_interval);
        let throttle = NoticeThrottle::new(config.notice_cooldown);
        Self {
            config,
            mode: EngineMode::Normal,
            enabled: false,
            generation: Generation::new(),
            cache: TileCache::new(),
            scheduler,
            committer,
            throttle,
            render,
            notices,
            metrics,
            url_template: None,
            last_viewport: None,
            current_required: HashSet::new(),
            last_committed: None,
        }
    }

    /// Turn the overlay on and evaluate the last known viewport.
    pub(crate) fn enable(&mut self, url_template: String) {
        info!("zone overlay enabled");
        self.enabled = true;
        self.url_template = Some(url_template);
        self.reset_tile_state();
        // Enabling is an explicit user action; re-arm the notice cooldowns.
        self.throttle.reset();
        self.mode = EngineMode::Normal;
        if let Some((bounds, zoom)) = self.last_viewport {
            self.evaluate(bounds, zoom);
        }
    }

    /// Turn the overlay off, stranding any in-flight work.
    pub(crate) fn disable(&mut self) {
        info!("zone overlay disabled");
        self.enabled = false;
        self.url_template = None;
        self.reset_tile_state();
        self.committer.commit_empty(self.render.as_ref());
        self.render.set_overview_visible(false);
        self.mode = EngineMode::Normal;
    }

    /// React to a viewport change. Recorded even while disabled.
    pub(crate) fn on_viewport_changed(&mut self, bounds: GeoBounds, zoom: f64) {
        self.last_viewport = Some((bounds, zoom));
        if !self.enabled {
            return;
        }
        self.evaluate(bounds, zoom);
    }

    /// Feasibility check, eviction, and fetch submission for one viewport.
    fn evaluate(&mut self, bounds: GeoBounds, zoom: f64) {
        if zoom < self.config.min_display_zoom {
            let message = format!(
                "Zone overlay unavailable: zoom {zoom:.1} is below the minimum of {:.1}; showing coarse overview",
                self.config.min_display_zoom
            );
            self.enter_degraded(NoticeReason::ZoomTooCoarse, message);
            return;
        }

        let required_count = tile_count(&bounds, self.config.tile_zoom);
        if required_count > self.config.max_tiles {
            let message = format!(
                "Zone overlay unavailable: visible area needs {required_count} tiles (limit {}) at zoom {zoom:.1}; showing coarse overview",
                self.config.max_tiles
            );
            self.enter_degraded(NoticeReason::AreaTooLarge, message);
            return;
        }

        if self.mode == EngineMode::Degraded {
            info!("returning to normal mode");
            self.mode = EngineMode::Normal;
            self.render.set_overview_visible(false);
        }

        let required = required_set(&bounds, self.config.tile_zoom);
        self.cache.retain_only(&required);

        let cache = &mut self.cache;
        let missing: HashSet<TileKey> = required
            .iter()
            .filter(|key| cache.get(key).is_none())
            .copied()
            .collect();

        if missing.is_empty() {
            if self.last_committed.as_ref() == Some(&required) {
                debug!("viewport already satisfied and committed; nothing to do");
                return;
            }
            // Eviction-only change: no fetches, but the renderer must see
            // the shrunken set.
            self.current_required = required;
            self.committer.request_commit();
            return;
        }

        let generation = self.generation.bump();
        debug!(
            missing = missing.len(),
            required = required.len(),
            generation = %generation,
            "submitting fetch batch"
        );
        self.current_required = required;
        // The template is always present while enabled.
        let Some(template) = self.url_template.clone() else {
            return;
        };
        self.scheduler.submit(missing, generation, &template);
    }

    fn enter_degraded(&mut self, reason: NoticeReason, message: String) {
        self.reset_tile_state();
        if self.mode != EngineMode::Degraded {
            info!(reason = %reason, "entering degraded mode");
            self.mode = EngineMode::Degraded;
            self.metrics.degraded_entered();
            self.render.set_overview_visible(true);
        }
        self.committer.commit_empty(self.render.as_ref());
        if self.throttle.allow(reason) {
            self.notices.notify(reason, &message);
            self.metrics.notice_emitted();
        }
    }

    /// Bump the generation and drop all tile state, stranding in-flight
    /// work. Shared by enable, disable, and degraded entry.
    fn reset_tile_state(&mut self) {
        self.generation.bump();
        self.cache.clear();
        self.scheduler.clear();
        self.current_required.clear();
        self.last_committed = None;
    }

    /// Apply one settled fetch result.
    pub(crate) fn handle_settled(&mut self, settled: FetchSettled) {
        let key = settled.key;
        match self.scheduler.on_settled(settled, self.generation) {
            Settlement::Apply {
                content,
                batch_complete,
            } => {
                if content.is_empty() {
                    self.metrics.empty_tile();
                } else {
                    self.metrics.tile_fetched();
                }
                self.cache.put(key, content);
                if batch_complete {
                    self.committer.request_commit();
                }
            }
            Settlement::Failed {
                error,
                batch_complete,
            } => {
                // Isolated per-tile failure: log it, keep the partial map.
                warn!(key = %key, error = %error, "zone tile fetch failed");
                self.metrics.fetch_failure();
                if batch_complete {
                    self.committer.request_commit();
                }
            }
            Settlement::Stale => {
                debug!(key = %key, "discarding stale fetch result");
                self.metrics.stale_result();
            }
        }
    }

    /// Deadline for the pending commit, if one is armed.
    pub(crate) fn commit_deadline(&self) -> Option<Instant> {
        self.committer.deadline()
    }

    /// Merge the cache and hand the snapshot to the renderer.
    ///
    /// Called by the engine loop when the armed deadline fires. Re-checks
    /// enablement and mode: a disable or degraded entry between the request
    /// and the frame boundary drops the commit.
    pub(crate) fn fire_commit(&mut self) {
        self.committer.mark_fired();
        if !self.enabled || self.mode == EngineMode::Degraded {
            debug!("dropping commit; engine no longer showing detail");
            return;
        }

        let mut entries: Vec<(&TileKey, _)> = self.cache.iter().collect();
        entries.sort_unstable_by_key(|(key, _)| **key);

        let mut features: Vec<ZoneFeature> = Vec::new();
        for (_, content) in entries {
            features.extend(content.features().iter().cloned());
        }

        debug!(
            tiles = self.cache.len(),
            features = features.len(),
            "committing merged zone collection"
        );
        self.last_committed = Some(self.current_required.clone());
        self.metrics.commit();
        self.render.commit(features);
    }
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("mode", &self.mode)
            .field("enabled", &self.enabled)
            .field("generation", &self.generation)
            .field("cached_tiles", &self.cache.len())
            .field("in_flight", &self.scheduler.in_flight_len())
            .finish()
    }
}
