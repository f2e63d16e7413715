//! The zone tile engine: viewport state machine, commit scheduling, and
//! lifecycle.
//!
//! [`TileEngine::spawn`] starts the engine loop; the returned
//! [`EngineHandle`] is the only surface the owning UI layer needs:
//! `enable`, `disable`, and `on_viewport_changed`.

mod commit;
mod config;
mod controller;
mod daemon;
mod generation;

pub use commit::CommitScheduler;
pub use config::{
    EngineConfig, DEFAULT_FRAME_INTERVAL, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_TILES,
    DEFAULT_MIN_DISPLAY_ZOOM, DEFAULT_NOTICE_COOLDOWN, DEFAULT_TILE_ZOOM,
};
pub use controller::EngineMode;
pub use daemon::{EngineHandle, TileEngine};
pub use generation::Generation;
