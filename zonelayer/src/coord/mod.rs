//! Tile coordinate math for the zone overlay.
//!
//! Provides conversions from geographic coordinates (latitude/longitude) to
//! Web Mercator slippy-map tile coordinates, and enumeration of the tile
//! rectangle covering a viewport bounding box at a fixed zoom level.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;

/// Maximum latitude representable in the Web Mercator projection.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in the Web Mercator projection.
pub const MIN_LAT: f64 = -85.05112878;

/// A tile coordinate in the zone-tile pyramid.
///
/// Used as the cache and de-duplication key throughout the engine. The
/// derived `Ord` (zoom, then x, then y) is the stable order tiles are merged
/// in when committing to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level of the tile pyramid.
    pub zoom: u8,
    /// Tile column (X coordinate, 0 = west edge of the projection).
    pub x: u32,
    /// Tile row (Y coordinate, 0 = north edge of the projection).
    pub y: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Geographic bounding box of the current viewport.
///
/// Anti-meridian-crossing boxes are out of scope: callers must supply
/// `min_lon <= max_lon`. The deployment region does not cross the
/// anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Minimum (southernmost) latitude.
    pub min_lat: f64,
    /// Maximum (northernmost) latitude.
    pub max_lat: f64,
    /// Minimum (westernmost) longitude.
    pub min_lon: f64,
    /// Maximum (easternmost) longitude.
    pub max_lon: f64,
}

impl GeoBounds {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Get the width of the bounds in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Get the height of the bounds in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

/// Converts geographic coordinates to tile coordinates at the given zoom.
///
/// Uses standard slippy-map tile numbering: X from the linear longitude
/// mapping, Y from the Web Mercator projection. Latitudes beyond the
/// projection range are clamped to the projection edge, and the resulting
/// indices are clamped to `[0, 2^zoom - 1]`, so any viewport a map widget
/// can produce yields a valid tile.
#[inline]
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n - 1.0).max(0.0);

    let x = ((lon + 180.0) / 360.0 * n).clamp(0.0, max_index) as u32;

    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT) * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).clamp(0.0, max_index) as u32;

    (x, y)
}

/// Enumerates the tile rectangle covering `bounds` at the given zoom.
///
/// Pure and deterministic: returns the full rectangle
/// `[x_min..x_max] × [y_min..y_max]` derived from the bounding box corners,
/// in row-major order (north to south, west to east), with no duplicates.
pub fn tiles_for(bounds: &GeoBounds, zoom: u8) -> Vec<TileKey> {
    // Northwest corner has the smallest x and y; southeast the largest.
    let (x_min, y_min) = lat_lon_to_tile(bounds.max_lat, bounds.min_lon, zoom);
    let (x_max, y_max) = lat_lon_to_tile(bounds.min_lat, bounds.max_lon, zoom);

    let mut tiles = Vec::with_capacity(
        ((x_max - x_min + 1) as usize) * ((y_max - y_min + 1) as usize),
    );
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            tiles.push(TileKey { zoom, x, y });
        }
    }
    tiles
}

/// Counts the tiles `tiles_for` would return without allocating them.
///
/// Used by the feasibility check before committing to a full enumeration.
pub fn tile_count(bounds: &GeoBounds, zoom: u8) -> usize {
    let (x_min, y_min) = lat_lon_to_tile(bounds.max_lat, bounds.min_lon, zoom);
    let (x_max, y_max) = lat_lon_to_tile(bounds.min_lat, bounds.max_lon, zoom);
    ((x_max - x_min + 1) as usize) * ((y_max - y_min + 1) as usize)
}

/// Collects the required set for membership tests.
pub fn required_set(bounds: &GeoBounds, zoom: u8) -> HashSet<TileKey> {
    tiles_for(bounds, zoom).into_iter().collect()
}
