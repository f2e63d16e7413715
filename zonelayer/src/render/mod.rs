//! Rendering collaborator contract.
//!
//! The engine never touches rendering primitives; it hands merged feature
//! collections to whatever implements [`RenderSink`] (in the full viewer,
//! the layer manager of the base-map rendering engine).

use crate::tile::ZoneFeature;

/// Rendering collaborator exposed by the owning UI layer.
pub trait RenderSink: Send + Sync {
    /// Replace the rendered zone overlay with `features`.
    ///
    /// The collection is a merged snapshot in stable tile-key order; the
    /// engine retains no reference to it after the call.
    fn commit(&self, features: Vec<ZoneFeature>);

    /// Remove the rendered zone overlay entirely.
    fn clear(&self);

    /// Show or hide the coarse overview representation used in degraded
    /// mode.
    fn set_overview_visible(&self, visible: bool);
}
