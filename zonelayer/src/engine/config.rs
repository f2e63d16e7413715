//! Engine configuration.

use std::time::Duration;

/// The single pyramid level the zone tile source publishes.
///
/// The upstream source only publishes one resolution; requesting other
/// levels is not meaningful.
pub const DEFAULT_TILE_ZOOM: u8 = 14;

/// Display zoom below which the overlay degrades to the coarse overview.
pub const DEFAULT_MIN_DISPLAY_ZOOM: f64 = 8.0;

/// Upper bound on tiles a single viewport may require at full detail.
pub const DEFAULT_MAX_TILES: usize = 64;

/// Maximum concurrent tile fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 6;

/// Minimum gap between user notices for the same reason.
pub const DEFAULT_NOTICE_COOLDOWN: Duration = Duration::from_secs(30);

/// Commit coalescing window: at most one merge-and-commit per frame.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Configuration for the zone tile engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Zoom level of the tile pyramid (fixed; see [`DEFAULT_TILE_ZOOM`]).
    pub tile_zoom: u8,

    /// Display zoom below which the engine enters degraded mode.
    ///
    /// Display zoom is the viewer's fractional zoom, distinct from
    /// `tile_zoom`.
    pub min_display_zoom: f64,

    /// Maximum number of tiles a viewport may require before the engine
    /// enters degraded mode instead of fetching.
    pub max_tiles: usize,

    /// Fetch pool size: at most this many fetches outstanding at once.
    pub max_concurrent_fetches: usize,

    /// Cooldown window for degraded-mode user notices, per reason.
    pub notice_cooldown: Duration,

    /// Minimum gap between commits to the renderer.
    pub frame_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_zoom: DEFAULT_TILE_ZOOM,
            min_display_zoom: DEFAULT_MIN_DISPLAY_ZOOM,
            max_tiles: DEFAULT_MAX_TILES,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            notice_cooldown: DEFAULT_NOTICE_COOLDOWN,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Set the pyramid zoom level.
    pub fn with_tile_zoom(mut self, zoom: u8) -> Self {
        self.tile_zoom = zoom;
        self
    }

    /// Set the minimum display zoom.
    pub fn with_min_display_zoom(mut self, zoom: f64) -> Self {
        self.min_display_zoom = zoom;
        self
    }

    /// Set the tile-count cap.
    pub fn with_max_tiles(mut self, max_tiles: usize) -> Self {
        self.max_tiles = max_tiles;
        self
    }

    /// Set the fetch pool size.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// Set the notice cooldown window.
    pub fn with_notice_cooldown(mut self, cooldown: Duration) -> Self {
        self.notice_cooldown = cooldown;
        self
    }

    /// Set the commit coalescing window.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }
}
