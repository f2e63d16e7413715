//! Zone tile source abstraction.
//!
//! The engine never talks HTTP directly; it fetches through the injected
//! [`TileFetcher`] collaborator. [`HttpTileFetcher`] is the production
//! implementation backed by reqwest; tests inject mocks.
//!
//! Timeouts are this layer's responsibility: the engine itself has no
//! timeout machinery and simply waits for every fetch to settle.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::classify::classify;
use crate::coord::TileKey;
use crate::tile::{TileContent, ZoneFeature};

/// Default HTTP timeout for a single tile fetch.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors surfaced by a tile fetch.
///
/// `NotFound` is not a failure: the upstream source legitimately omits
/// tiles with no features, and the engine caches such tiles as empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source has no tile at this coordinate.
    #[error("tile not found")]
    NotFound,
    /// Network, HTTP, or payload decode failure.
    #[error("fetch failed: {0}")]
    Failed(String),
}

/// Tile-fetch collaborator consumed by the engine.
///
/// Implementations substitute the tile coordinates into `url_template`
/// (placeholders `{z}`, `{x}`, `{y}`), retrieve the payload, and decode it
/// into classified [`TileContent`].
pub trait TileFetcher: Send + Sync {
    /// Fetch and decode one zone tile.
    fn fetch<'a>(
        &'a self,
        url_template: &'a str,
        key: TileKey,
    ) -> Pin<Box<dyn Future<Output = Result<TileContent, FetchError>> + Send + 'a>>;
}

/// Production tile fetcher backed by reqwest.
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Failed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch<'a>(
        &'a self,
        url_template: &'a str,
        key: TileKey,
    ) -> Pin<Box<dyn Future<Output = Result<TileContent, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let url = expand_template(url_template, key);

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Failed(format!("request failed: {e}")))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound);
            }
            if !response.status().is_success() {
                return Err(FetchError::Failed(format!(
                    "HTTP {} from {}",
                    response.status(),
                    url
                )));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Failed(format!("failed to read response: {e}")))?;

            decode_tile(&body)
        })
    }
}

/// Substitutes `{z}`, `{x}`, `{y}` placeholders into a tile URL template.
fn expand_template(template: &str, key: TileKey) -> String {
    template
        .replace("{z}", &key.zoom.to_string())
        .replace("{x}", &key.x.to_string())
        .replace("{y}", &key.y.to_string())
}

/// Raw upstream tile payload: `{"features": [{...}, ...]}`.
#[derive(Deserialize)]
struct RawTile {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Value,
    #[serde(default)]
    geometry: Value,
}

/// Decodes a tile payload and classifies each feature, preserving upstream
/// feature order.
fn decode_tile(bytes: &[u8]) -> Result<TileContent, FetchError> {
    let raw: RawTile = serde_json::from_slice(bytes)
        .map_err(|e| FetchError::Failed(format!("invalid tile payload: {e}")))?;

    let features = raw
        .features
        .into_iter()
        .map(|feature| {
            let (category, label) = classify(&attribute_text(&feature.properties));
            ZoneFeature {
                category,
                label,
                properties: feature.properties,
                geometry: feature.geometry,
            }
        })
        .collect();

    Ok(TileContent::new(features))
}

/// Flattens the string-valued properties of a feature into one searchable
/// haystack for the classifier.
fn attribute_text(properties: &Value) -> String {
    match properties.as_object() {
        Some(map) => map
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}
