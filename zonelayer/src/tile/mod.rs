//! Zone tile content types.
//!
//! A tile's content is the ordered list of zone features decoded from the
//! upstream payload, each annotated with its classification. The records
//! themselves stay opaque: properties and geometry pass through to the
//! renderer untouched.

use serde_json::Value;

use crate::classify::ZoneCategory;

/// One zone feature, annotated with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFeature {
    /// Category tag assigned by the surface classifier.
    pub category: ZoneCategory,
    /// Human-readable label for the legend.
    pub label: String,
    /// Raw upstream attributes, passed through untouched.
    pub properties: Value,
    /// Raw upstream geometry, passed through untouched.
    pub geometry: Value,
}

/// The decoded content of one zone tile.
///
/// A tile may be legitimately empty: the upstream source omits tiles with
/// no features, and a not-found response is represented as empty content,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileContent {
    features: Vec<ZoneFeature>,
}

impl TileContent {
    /// Wrap an ordered feature list.
    pub fn new(features: Vec<ZoneFeature>) -> Self {
        Self { features }
    }

    /// The empty tile, used for upstream not-found responses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The features in upstream order.
    pub fn features(&self) -> &[ZoneFeature] {
        &self.features
    }

    /// Consume the content, yielding the feature list.
    pub fn into_features(self) -> Vec<ZoneFeature> {
        self.features
    }

    /// Number of features in the tile.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True if the tile holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
