//! ZoneLayer - viewport-driven zone tile engine for map overlays
//!
//! This library implements the tile engine behind a map viewer's
//! jurisdictional/advisory zone overlay: given a changing viewport over a
//! fixed tile pyramid, it computes the visible tile set, fetches missing
//! tiles with bounded concurrency and request de-duplication, discards
//! results the viewport has moved past, evicts tiles that scrolled out of
//! view, and commits merged feature collections to the rendering layer —
//! degrading to a coarse overview when full detail is infeasible.
//!
//! # High-Level API
//!
//! The [`engine`] module provides the lifecycle surface:
//!
//! ```ignore
//! use std::sync::Arc;
//! use zonelayer::coord::GeoBounds;
//! use zonelayer::engine::{EngineConfig, TileEngine};
//! use zonelayer::source::HttpTileFetcher;
//!
//! let fetcher = Arc::new(HttpTileFetcher::new()?);
//! let engine = TileEngine::spawn(EngineConfig::default(), fetcher, render, notices);
//!
//! engine.enable("https://tiles.example.jp/zones/{z}/{x}/{y}.json");
//! engine.on_viewport_changed(GeoBounds::new(37.39, 37.42, 136.87, 136.90), 12.0);
//! ```

pub mod cache;
pub mod classify;
pub mod coord;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod notice;
pub mod render;
pub mod source;
pub mod telemetry;
pub mod tile;

/// Version of the ZoneLayer library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
